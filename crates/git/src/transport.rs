//! Remote ref listing transports.

use async_trait::async_trait;
use sourcepin_core::{Error, Result};
use tracing::{debug, trace};

/// One advertised remote ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Full ref name (`HEAD`, `refs/heads/main`, `refs/tags/v1^{}`, ...).
    pub name: String,
    /// The object id the ref points at.
    pub oid: String,
}

/// Capability to list the advertised refs of a remote repository.
#[async_trait]
pub trait LsRemote: Send + Sync {
    /// List all advertised refs of `url`, peeled entries included.
    async fn ls_remote(&self, url: &str) -> Result<Vec<RemoteRef>>;
}

/// Default transport: the system `git` binary.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

#[async_trait]
impl LsRemote for SystemGit {
    async fn ls_remote(&self, url: &str) -> Result<Vec<RemoteRef>> {
        debug!(%url, "listing remote refs");
        let output = tokio::process::Command::new("git")
            .arg("ls-remote")
            .arg("--")
            .arg(url)
            // Never hang on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| Error::git_resolve(url, "", format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git_resolve(
                url,
                "",
                format!("git ls-remote failed: {}", stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let refs = parse_ls_remote(&stdout);
        trace!(%url, count = refs.len(), "listed remote refs");
        Ok(refs)
    }
}

/// Parse `git ls-remote` output: one `<oid>\t<refname>` per line.
fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(|line| {
            let (oid, name) = line.split_once('\t')?;
            let oid = oid.trim();
            let name = name.trim();
            if oid.is_empty() || name.is_empty() {
                return None;
            }
            Some(RemoteRef {
                name: name.to_string(),
                oid: oid.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ls_remote_output() {
        let output = concat!(
            "54d56cab3a0882b43ca74a0c2f22ff54c2e9ef13\tHEAD\n",
            "54d56cab3a0882b43ca74a0c2f22ff54c2e9ef13\trefs/heads/trunk\n",
            "2e239e4df22b50b5f6bd4ff6ce09e26c4e600e57\trefs/tags/v2.40.0\n",
            "54d56cab3a0882b43ca74a0c2f22ff54c2e9ef13\trefs/tags/v2.40.0^{}\n",
        );
        let refs = parse_ls_remote(output);
        assert_eq!(refs.len(), 4);
        assert_eq!(refs[0].name, "HEAD");
        assert_eq!(refs[3].name, "refs/tags/v2.40.0^{}");
        assert_eq!(refs[3].oid, "54d56cab3a0882b43ca74a0c2f22ff54c2e9ef13");
    }

    #[test]
    fn ignores_malformed_lines() {
        let refs = parse_ls_remote("warning: redirecting\nnot-a-ref-line\n");
        assert!(refs.is_empty());
    }
}
