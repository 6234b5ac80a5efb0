//! Manifest digest resolution.

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::{Client, Reference, manifest};
use sha2::{Digest, Sha256};
use sourcepin_core::resolve::{ImageResolve, ResolvedImage};
use sourcepin_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::auth_for;
use crate::hardened::{HardenedMirror, is_not_found_or_unauthorized};

/// Manifest media types we accept, index formats first so multi-platform
/// images resolve to their index digest (what the engine pins against).
const MANIFEST_ACCEPT_TYPES: &[&str] = &[
    manifest::OCI_IMAGE_INDEX_MEDIA_TYPE,
    manifest::IMAGE_MANIFEST_LIST_MEDIA_TYPE,
    manifest::OCI_IMAGE_MEDIA_TYPE,
    manifest::IMAGE_MANIFEST_MEDIA_TYPE,
];

/// Environment-derived configuration for [`ImageResolver`], read once and
/// passed in explicitly so tests can construct resolvers without touching
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Path to a docker CLI `config.json` for credential discovery.
    pub docker_config: Option<PathBuf>,
    /// Token used for `ghcr.io` when the docker config has no entry.
    pub github_token: Option<String>,
    /// Enable hardened-mirror substitution for official images.
    pub hardened_mirror: Option<HardenedMirror>,
}

impl RegistryOptions {
    /// Discover configuration from the environment: `DOCKER_CONFIG` (or
    /// `~/.docker/config.json`) and `GITHUB_TOKEN`/`GH_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        let docker_config = std::env::var_os("DOCKER_CONFIG")
            .map(|dir| PathBuf::from(dir).join("config.json"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker").join("config.json")));
        let github_token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok();
        Self {
            docker_config,
            github_token,
            hardened_mirror: None,
        }
    }

    /// Enable hardened-mirror substitution.
    #[must_use]
    pub fn with_hardened_mirror(mut self, mirror: HardenedMirror) -> Self {
        self.hardened_mirror = Some(mirror);
        self
    }
}

/// Capability to fetch a manifest digest for a normalized reference. The
/// transport error stays typed so the mirror fallback can classify it.
#[async_trait]
pub(crate) trait FetchDigest: Send + Sync {
    async fn fetch_digest(
        &self,
        reference: &Reference,
    ) -> std::result::Result<String, OciDistributionError>;
}

/// The real transport: an OCI distribution session per reference domain.
struct RegistrySession {
    client: Client,
    docker_config: Option<PathBuf>,
    github_token: Option<String>,
}

#[async_trait]
impl FetchDigest for RegistrySession {
    /// Fetch the raw manifest and compute its digest locally. The digest
    /// the transport claims is never used for the result; a disagreement
    /// is logged since it means something between us and the registry
    /// rewrote the manifest.
    async fn fetch_digest(
        &self,
        reference: &Reference,
    ) -> std::result::Result<String, OciDistributionError> {
        let auth = auth_for(
            reference.registry(),
            self.docker_config.as_deref(),
            self.github_token.as_deref(),
        );

        let (bytes, claimed) = self
            .client
            .pull_manifest_raw(reference, &auth, MANIFEST_ACCEPT_TYPES)
            .await?;

        let computed = format!("sha256:{:x}", Sha256::digest(&bytes));
        if !claimed.is_empty() && claimed != computed {
            warn!(
                reference = %reference,
                %claimed,
                %computed,
                "transport-claimed digest disagrees with manifest content"
            );
        }

        Ok(computed)
    }
}

/// Resolves image references to manifest digests.
pub struct ImageResolver {
    fetch: Arc<dyn FetchDigest>,
    mirror: Option<HardenedMirror>,
}

impl ImageResolver {
    /// Create a resolver with the given configuration.
    #[must_use]
    pub fn new(options: RegistryOptions) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            fetch: Arc::new(RegistrySession {
                client: Client::new(config),
                docker_config: options.docker_config,
                github_token: options.github_token,
            }),
            mirror: options.hardened_mirror,
        }
    }

    pub(crate) fn with_fetch(fetch: Arc<dyn FetchDigest>, mirror: Option<HardenedMirror>) -> Self {
        Self { fetch, mirror }
    }

    async fn fetch_cancellable(
        &self,
        reference: &Reference,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, Attempt> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Attempt::Cancelled),
            result = self.fetch.fetch_digest(reference) => result.map_err(Attempt::Failed),
        }
    }
}

enum Attempt {
    Cancelled,
    Failed(OciDistributionError),
}

#[async_trait]
impl ImageResolve for ImageResolver {
    async fn resolve(&self, original: &str, cancel: &CancellationToken) -> Result<ResolvedImage> {
        let parsed: Reference = original.parse().map_err(|e: oci_distribution::ParseError| {
            Error::image_resolve(original, e.to_string())
        })?;
        let reference = with_default_tag(parsed);

        // Hardened-mirror attempt: a miss falls back to the original
        // registry and never surfaces; every other failure is fatal.
        if let Some(mirror) = &self.mirror
            && let Some(mapped) = mirror.map(&reference)
        {
            debug!(%original, mirror = %mapped, "trying hardened mirror");
            match self.fetch_cancellable(&mapped, cancel).await {
                Ok(digest) => {
                    info!(%original, mirror = %mapped, %digest, "pinned to hardened mirror");
                    return Ok(ResolvedImage {
                        reference: mapped.whole(),
                        digest,
                    });
                }
                Err(Attempt::Failed(err)) if is_not_found_or_unauthorized(&err) => {
                    debug!(
                        %original,
                        mirror = %mapped,
                        error = %err,
                        "hardened mirror has no match; resolving original reference"
                    );
                }
                Err(Attempt::Failed(err)) => {
                    return Err(Error::image_resolve(original, err.to_string()));
                }
                Err(Attempt::Cancelled) => return Err(Error::Cancelled),
            }
        }

        let digest = match self.fetch_cancellable(&reference, cancel).await {
            Ok(digest) => digest,
            Err(Attempt::Failed(err)) => {
                return Err(Error::image_resolve(original, err.to_string()));
            }
            Err(Attempt::Cancelled) => return Err(Error::Cancelled),
        };

        debug!(%original, reference = %reference, %digest, "resolved image digest");
        Ok(ResolvedImage {
            reference: reference.whole(),
            digest,
        })
    }
}

/// Apply the implicit default tag when neither tag nor digest is present.
fn with_default_tag(reference: Reference) -> Reference {
    if reference.tag().is_none() && reference.digest().is_none() {
        Reference::with_tag(
            reference.registry().to_string(),
            reference.repository().to_string(),
            "latest".to_string(),
        )
    } else {
        reference
    }
}
