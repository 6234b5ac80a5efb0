//! Hardened-mirror substitution for official images.
//!
//! A hardened mirror serves security-hardened builds of official images
//! under the bare image name (`dhi.io/golang`, no `library/` prefix). Only
//! Docker Hub official images are eligible; everything else resolves
//! against its own registry untouched.

use oci_distribution::Reference;
use oci_distribution::errors::{OciDistributionError, OciErrorCode};

/// Default hardened registry hostname.
pub const DEFAULT_HARDENED_REGISTRY: &str = "dhi.io";

/// Canonical Docker Hub domain after reference normalization.
const DOCKER_HUB_DOMAIN: &str = "docker.io";

/// Path prefix carried by official images on Docker Hub.
const LIBRARY_PREFIX: &str = "library/";

/// Maps eligible official-image references onto a hardened registry.
#[derive(Debug, Clone)]
pub struct HardenedMirror {
    registry: String,
}

impl Default for HardenedMirror {
    fn default() -> Self {
        Self::new(DEFAULT_HARDENED_REGISTRY)
    }
}

impl HardenedMirror {
    /// Create a mirror mapping onto `registry`.
    #[must_use]
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// The hardened registry hostname.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// True if `reference` is an official Docker Hub image that may have a
    /// hardened equivalent: canonical hub domain, single-segment
    /// `library/` path, and not already pointing at the mirror.
    #[must_use]
    pub fn eligible(&self, reference: &Reference) -> bool {
        if reference.registry() != DOCKER_HUB_DOMAIN || reference.registry() == self.registry {
            return false;
        }
        reference
            .repository()
            .strip_prefix(LIBRARY_PREFIX)
            .is_some_and(|name| !name.is_empty() && !name.contains('/'))
    }

    /// Rewrite an eligible reference onto the mirror, keeping the tag.
    /// Returns `None` when the reference is not eligible.
    #[must_use]
    pub fn map(&self, reference: &Reference) -> Option<Reference> {
        if !self.eligible(reference) {
            return None;
        }
        let name = reference.repository().strip_prefix(LIBRARY_PREFIX)?;
        let tag = reference.tag().unwrap_or("latest");
        Some(Reference::with_tag(
            self.registry.clone(),
            name.to_string(),
            tag.to_string(),
        ))
    }
}

/// Classify a registry error as "mirror has no such image / won't serve us",
/// the one case where falling back to the original registry is correct.
///
/// Typed classification first; the transport's human-readable error text is
/// only consulted for error shapes that carry no structure.
pub(crate) fn is_not_found_or_unauthorized(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_)
        | OciDistributionError::UnauthorizedError { .. }
        | OciDistributionError::AuthenticationFailure(_) => true,
        OciDistributionError::ServerError { code, .. } => matches!(*code, 401 | 403 | 404),
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown
                    | OciErrorCode::NameUnknown
                    | OciErrorCode::Denied
                    | OciErrorCode::Unauthorized
            )
        }),
        other => matches_not_found_text(&other.to_string()),
    }
}

/// Last-resort textual classification for transports without structured
/// error codes.
fn matches_not_found_text(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "401",
        "403",
        "404",
        "manifest unknown",
        "name unknown",
        "denied",
        "unauthorized",
        "does not exist",
    ];
    let message = message.to_lowercase();
    MARKERS.iter().any(|marker| message.contains(marker))
}
