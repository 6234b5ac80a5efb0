//! The HTTP resolver: strategy dispatch, variance capture, volatility.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CACHE_CONTROL, EXPIRES, HeaderMap, VARY};
use reqwest::{Client, Url};
use sourcepin_core::resolve::{HttpResolution, HttpResolve};
use sourcepin_core::{Error, Result};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Accept value sent on every request.
pub(crate) const ACCEPT_ANY: &str = "*/*";
/// Transfer encoding is forced to identity so the hashed bytes are the
/// canonical representation, not a negotiated compression of it.
pub(crate) const IDENTITY: &str = "identity";

/// Environment-derived configuration for [`HttpResolver`].
///
/// Host tables are configuration rather than hardcoded so tests can point
/// the fast paths at local mock servers; the defaults are the production
/// hosts.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Bearer token for the release-hosting API (raises rate limits).
    pub github_token: Option<String>,
    /// `User-Agent` sent on every request.
    pub user_agent: String,
    /// Hosts whose `ETag` is the content's bare sha256 hex.
    pub raw_content_hosts: Vec<String>,
    /// Hosts serving release-download URLs with a queryable asset API.
    pub release_hosts: Vec<String>,
    /// Base URL of the release-hosting API.
    pub release_api_base: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            github_token: None,
            user_agent: concat!("sourcepin/", env!("CARGO_PKG_VERSION")).to_string(),
            raw_content_hosts: vec![
                "raw.githubusercontent.com".to_string(),
                "gist.githubusercontent.com".to_string(),
            ],
            release_hosts: vec!["github.com".to_string()],
            release_api_base: "https://api.github.com".to_string(),
        }
    }
}

impl HttpOptions {
    /// Discover configuration from the environment
    /// (`GITHUB_TOKEN`/`GH_TOKEN`).
    #[must_use]
    pub fn from_env() -> Self {
        let github_token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok();
        Self {
            github_token,
            ..Self::default()
        }
    }
}

/// Resolves HTTP(S) URLs to content checksums.
pub struct HttpResolver {
    pub(crate) client: Client,
    pub(crate) options: HttpOptions,
}

impl HttpResolver {
    /// Create a resolver with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot initialize; with rustls and no
    /// custom settings this indicates a broken environment, not bad input.
    #[must_use]
    pub fn new(options: HttpOptions) -> Self {
        #[allow(clippy::expect_used)]
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .build()
            .expect("failed to create HTTP client - TLS backend initialization failed");
        Self { client, options }
    }

    /// The request headers every resolution sends; captured-header values
    /// are looked up here so attrs record exactly what we negotiated with.
    fn request_header_value(&self, name: &str) -> String {
        if name.eq_ignore_ascii_case("user-agent") {
            self.options.user_agent.clone()
        } else if name.eq_ignore_ascii_case("accept") {
            ACCEPT_ANY.to_string()
        } else if name.eq_ignore_ascii_case("accept-encoding") {
            IDENTITY.to_string()
        } else {
            String::new()
        }
    }

    /// Lightweight metadata probe: one HEAD request serving both variance
    /// capture and volatility detection. A failed probe degrades silently -
    /// plenty of servers reject HEAD.
    async fn probe(&self, url: &Url) -> Option<HeaderMap> {
        let response = self
            .client
            .head(url.clone())
            .header(ACCEPT, ACCEPT_ANY)
            .header(ACCEPT_ENCODING, IDENTITY)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            trace!(%url, status = %response.status(), "metadata probe rejected");
            return None;
        }
        Some(response.headers().clone())
    }

    fn captured_headers(&self, probe: Option<&HeaderMap>) -> BTreeMap<String, String> {
        let mut captured = BTreeMap::new();
        let Some(headers) = probe else {
            return captured;
        };
        for vary in headers.get_all(VARY) {
            let Ok(value) = vary.to_str() else { continue };
            for name in value.split(',') {
                let name = name.trim();
                if name.is_empty() || name == "*" {
                    continue;
                }
                captured.insert(name.to_string(), self.request_header_value(name));
            }
        }
        captured
    }
}

#[async_trait]
impl HttpResolve for HttpResolver {
    async fn resolve(&self, url: &str, cancel: &CancellationToken) -> Result<HttpResolution> {
        let parsed =
            Url::parse(url).map_err(|e| Error::http_resolve(url, format!("invalid URL: {e}")))?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            resolution = self.resolve_uncancelled(url, &parsed) => resolution,
        }
    }
}

impl HttpResolver {
    async fn resolve_uncancelled(&self, original: &str, url: &Url) -> Result<HttpResolution> {
        let probe = self.probe(url).await;
        let headers = self.captured_headers(probe.as_ref());
        let volatile = probe.as_ref().and_then(volatility_reason);

        let checksum = if let Some(checksum) = self.etag_checksum(url).await {
            debug!(%url, %checksum, "checksum from raw-content ETag");
            checksum
        } else if let Some(checksum) = self.release_asset_checksum(url).await {
            debug!(%url, %checksum, "checksum from release asset API");
            checksum
        } else if let Some(checksum) = self.object_store_checksum(url).await {
            debug!(%url, %checksum, "checksum from object-store header");
            checksum
        } else {
            let checksum = self.download_checksum(original, url).await?;
            debug!(%url, %checksum, "checksum from full download");
            checksum
        };

        Ok(HttpResolution {
            checksum,
            headers,
            volatile,
        })
    }
}

/// Extract the reason a response should be treated as volatile, if any.
fn volatility_reason(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()) {
        for directive in value.split(',') {
            let directive = directive.trim().to_ascii_lowercase();
            let non_cacheable = directive == "no-store"
                || directive == "no-cache"
                || directive
                    .strip_prefix("max-age=")
                    .is_some_and(|age| age.trim() == "0");
            if non_cacheable {
                return Some(format!("Cache-Control: {directive}"));
            }
        }
    }

    if let Some(value) = headers.get(EXPIRES).and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        // RFC 7234: an invalid date (servers conventionally send "0" or
        // "-1") means already expired.
        match chrono::DateTime::parse_from_rfc2822(value) {
            Ok(when) if when.with_timezone(&chrono::Utc) <= chrono::Utc::now() => {
                return Some(format!("Expires: {value}"));
            }
            Ok(_) => {}
            Err(_) => return Some(format!("Expires: {value}")),
        }
    }

    None
}
