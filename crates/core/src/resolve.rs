//! Resolver capability traits and their result types.
//!
//! Each protocol resolver lives in its own crate and implements one of the
//! traits below; the assembler only ever sees the traits, which keeps every
//! resolver substitutable with a fake in tests. All resolution is bound to a
//! caller-supplied [`CancellationToken`]: implementations must abort
//! in-flight requests promptly and surface [`crate::Error::Cancelled`].

use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// An image reference resolved to its manifest digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// The normalized reference that was actually resolved - under
    /// hardened-mirror substitution this points at the mirror.
    pub reference: String,
    /// Manifest digest in `algorithm:hex` form.
    pub digest: String,
}

impl ResolvedImage {
    /// The digest-qualified reference for the rewrite rule.
    #[must_use]
    pub fn pinned(&self) -> String {
        format!("{}@{}", self.reference, self.digest)
    }
}

/// An HTTP URL resolved to a content checksum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResolution {
    /// `sha256:<hex>` over the content the build engine will fetch.
    pub checksum: String,
    /// Request headers named by the response `Vary`, with the concrete
    /// values this resolver sent.
    pub headers: BTreeMap<String, String>,
    /// Set when cache headers mark the content non-cacheable or expired;
    /// carries the reason for the advisory.
    pub volatile: Option<String>,
}

/// Non-fatal advisory produced during resolution, reported out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The pinned content is served with volatility markers and may change
    /// between pinning and building.
    VolatileContent {
        /// The URL that was pinned anyway.
        url: String,
        /// The cache signal that triggered the advisory.
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolatileContent { url, reason } => {
                write!(f, "content at {url} may be volatile ({reason}); pinned checksum can go stale")
            }
        }
    }
}

/// Resolves an image reference to a manifest digest.
#[async_trait]
pub trait ImageResolve: Send + Sync {
    /// Resolve `reference` (as written, without digest) to a digest-qualified
    /// reference. Implementations apply default-tag normalization and any
    /// hardened-mirror substitution.
    async fn resolve(&self, reference: &str, cancel: &CancellationToken)
    -> Result<ResolvedImage>;
}

/// Resolves an HTTP(S) URL to a content checksum.
#[async_trait]
pub trait HttpResolve: Send + Sync {
    /// Resolve `url` to the checksum the build engine will verify, plus any
    /// captured negotiation headers and volatility signal.
    async fn resolve(&self, url: &str, cancel: &CancellationToken) -> Result<HttpResolution>;
}

/// Resolves a git repository URL and ref to a full commit id.
#[async_trait]
pub trait GitResolve: Send + Sync {
    /// Resolve `reference` (branch or tag; empty for the remote HEAD) at
    /// `url` to a 40-hex commit id. A 40-hex `reference` short-circuits
    /// without a transport call.
    async fn resolve(
        &self,
        url: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// True for a full, unambiguous commit id.
#[must_use]
pub fn is_full_commit_id(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}
