//! Ref matching over a remote listing.

use async_trait::async_trait;
use sourcepin_core::resolve::{GitResolve, is_full_commit_id};
use sourcepin_core::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::{LsRemote, RemoteRef, SystemGit};

/// Resolves a repository URL and ref to a full commit id.
pub struct GitResolver {
    transport: Arc<dyn LsRemote>,
}

impl Default for GitResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GitResolver {
    /// Resolver over the system git transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(SystemGit))
    }

    /// Resolver over a custom transport (tests use fakes here).
    #[must_use]
    pub fn with_transport(transport: Arc<dyn LsRemote>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl GitResolve for GitResolver {
    async fn resolve(
        &self,
        url: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        // Already immutable - nothing to resolve.
        if is_full_commit_id(reference) {
            return Ok(reference.to_ascii_lowercase());
        }

        let refs = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            refs = self.transport.ls_remote(url) => refs?,
        };

        let commit = match_reference(&refs, reference)
            .ok_or_else(|| Error::git_resolve(url, reference, "no matching branch or tag"))?;

        debug!(%url, %reference, %commit, "resolved git ref");
        Ok(commit)
    }
}

/// Match order: remote HEAD for an empty ref, then exact branch, then exact
/// tag peeled to the commit it ultimately points to.
fn match_reference(refs: &[RemoteRef], reference: &str) -> Option<String> {
    if reference.is_empty() {
        return find(refs, "HEAD");
    }

    if let Some(oid) = find(refs, &format!("refs/heads/{reference}")) {
        return Some(oid);
    }

    let tag = format!("refs/tags/{reference}");
    if let Some(tag_oid) = find(refs, &tag) {
        // An annotated tag advertises a peeled `^{}` entry naming the
        // commit; its absence means the tag is lightweight and already
        // points at the commit.
        return Some(find(refs, &format!("{tag}^{{}}")).unwrap_or(tag_oid));
    }

    None
}

fn find(refs: &[RemoteRef], name: &str) -> Option<String> {
    refs.iter().find(|r| r.name == name).map(|r| r.oid.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT_A: &str = "54d56cab3a0882b43ca74a0c2f22ff54c2e9ef13";
    const COMMIT_B: &str = "2e239e4df22b50b5f6bd4ff6ce09e26c4e600e57";

    fn remote_ref(name: &str, oid: &str) -> RemoteRef {
        RemoteRef {
            name: name.to_string(),
            oid: oid.to_string(),
        }
    }

    struct FakeTransport {
        refs: Vec<RemoteRef>,
    }

    #[async_trait]
    impl LsRemote for FakeTransport {
        async fn ls_remote(&self, _url: &str) -> Result<Vec<RemoteRef>> {
            Ok(self.refs.clone())
        }
    }

    /// Transport that must never be reached.
    struct UnreachableTransport;

    #[async_trait]
    impl LsRemote for UnreachableTransport {
        async fn ls_remote(&self, url: &str) -> Result<Vec<RemoteRef>> {
            Err(Error::git_resolve(url, "", "transport must not be called"))
        }
    }

    fn resolver(refs: Vec<RemoteRef>) -> GitResolver {
        GitResolver::with_transport(Arc::new(FakeTransport { refs }))
    }

    #[tokio::test]
    async fn full_commit_id_short_circuits() {
        let resolver = GitResolver::with_transport(Arc::new(UnreachableTransport));
        let upper = COMMIT_A.to_ascii_uppercase();
        let commit = resolver
            .resolve("https://example.com/repo.git", &upper, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(commit, COMMIT_A);
    }

    #[tokio::test]
    async fn branch_wins_over_tag_of_same_name() {
        let refs = vec![
            remote_ref("refs/heads/v1", COMMIT_A),
            remote_ref("refs/tags/v1", COMMIT_B),
        ];
        let commit = resolver(refs)
            .resolve("https://example.com/repo.git", "v1", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(commit, COMMIT_A);
    }

    #[tokio::test]
    async fn annotated_tag_peels_to_commit() {
        // The tag object id must never be returned.
        let refs = vec![
            remote_ref("refs/tags/v2.40.0", COMMIT_B),
            remote_ref("refs/tags/v2.40.0^{}", COMMIT_A),
        ];
        let commit = resolver(refs)
            .resolve(
                "https://github.com/cli/cli.git",
                "v2.40.0",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(commit, COMMIT_A);
    }

    #[tokio::test]
    async fn lightweight_tag_resolves_directly() {
        let refs = vec![remote_ref("refs/tags/snapshot", COMMIT_B)];
        let commit = resolver(refs)
            .resolve("https://example.com/repo.git", "snapshot", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(commit, COMMIT_B);
    }

    #[tokio::test]
    async fn empty_ref_resolves_remote_head() {
        let refs = vec![
            remote_ref("HEAD", COMMIT_A),
            remote_ref("refs/heads/main", COMMIT_A),
        ];
        let commit = resolver(refs)
            .resolve("https://example.com/repo.git", "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(commit, COMMIT_A);
    }

    #[tokio::test]
    async fn unknown_ref_is_fatal() {
        let refs = vec![remote_ref("refs/heads/main", COMMIT_A)];
        let err = resolver(refs)
            .resolve("https://example.com/repo.git", "v9.9.9", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::GitResolve { url, reference, message } => {
                assert_eq!(url, "https://example.com/repo.git");
                assert_eq!(reference, "v9.9.9");
                assert!(message.contains("no matching branch or tag"));
            }
            other => panic!("expected GitResolve error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn partial_sha_is_not_matched() {
        // Partial SHA matching is ambiguous against a plain ref listing.
        let refs = vec![remote_ref("refs/heads/main", COMMIT_A)];
        let err = resolver(refs)
            .resolve("https://example.com/repo.git", "54d56cab", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GitResolve { .. }));
    }

    #[tokio::test]
    async fn cancellation_aborts_listing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver(vec![])
            .resolve("https://example.com/repo.git", "main", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
