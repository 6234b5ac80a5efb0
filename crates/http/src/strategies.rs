//! Ordered checksum strategies; the first to produce a checksum wins.
//!
//! Fast-path strategies are best-effort: a probe that misses (wrong host,
//! no marker, rejected request) falls through silently. Only the final
//! download is a deciding request whose failure is fatal.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Url;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, ETAG};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sourcepin_core::{Error, Result};
use tracing::{debug, trace};

use crate::resolver::{ACCEPT_ANY, HttpResolver, IDENTITY};

/// Request header asking an object store to report content checksums.
const AMZ_CHECKSUM_MODE: &str = "x-amz-checksum-mode";
/// Response header carrying the base64 sha256 checksum.
const AMZ_CHECKSUM_SHA256: &str = "x-amz-checksum-sha256";

/// Release metadata returned by the asset-listing API.
#[derive(Debug, Deserialize)]
struct Release {
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    /// Published content digest (`sha256:<hex>`), present on newer uploads.
    digest: Option<String>,
}

impl HttpResolver {
    /// Strategy 1: known raw-content hosts serve the content's sha256 as a
    /// bare-hex `ETag`, so a metadata request is enough.
    pub(crate) async fn etag_checksum(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if !self.options.raw_content_hosts.iter().any(|h| h == host) {
            return None;
        }

        let response = self
            .client
            .head(url.clone())
            .header(ACCEPT, ACCEPT_ANY)
            .header(ACCEPT_ENCODING, IDENTITY)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            trace!(%url, status = %response.status(), "ETag probe rejected");
            return None;
        }

        let etag = response.headers().get(ETAG)?.to_str().ok()?.trim();
        let etag = etag.strip_prefix("W/").unwrap_or(etag).trim_matches('"');
        if etag.len() == 64 && etag.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(format!("sha256:{}", etag.to_ascii_lowercase()))
        } else {
            trace!(%url, %etag, "ETag is not a bare sha256");
            None
        }
    }

    /// Strategy 2: release-download URLs have a structured asset-listing
    /// API that publishes digests for newer uploads.
    pub(crate) async fn release_asset_checksum(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if !self.options.release_hosts.iter().any(|h| h == host) {
            return None;
        }
        let (owner, repo, tag, asset_name) = parse_release_download_path(url.path())?;

        let endpoint = format!(
            "{}/repos/{owner}/{repo}/releases/tags/{tag}",
            self.options.release_api_base
        );
        debug!(%endpoint, "querying release asset API");

        let mut request = self
            .client
            .get(&endpoint)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.options.github_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.ok()?;
        if !response.status().is_success() {
            trace!(%endpoint, status = %response.status(), "release API rejected");
            return None;
        }

        let release: Release = response.json().await.ok()?;
        let asset = release.assets.iter().find(|a| a.name == asset_name)?;
        asset.digest.clone()
    }

    /// Strategy 3: object stores report a checksum header when asked.
    pub(crate) async fn object_store_checksum(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if !is_object_store_host(host) {
            return None;
        }

        let response = self
            .client
            .head(url.clone())
            .header(AMZ_CHECKSUM_MODE, "ENABLED")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }

        let encoded = response.headers().get(AMZ_CHECKSUM_SHA256)?.to_str().ok()?;
        decode_object_store_checksum(encoded)
    }

    /// Fallback: issue the same GET the build engine will and hash the
    /// body. This is the deciding request - any failure here is fatal.
    pub(crate) async fn download_checksum(&self, original: &str, url: &Url) -> Result<String> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_ANY)
            .header(ACCEPT_ENCODING, IDENTITY)
            .send()
            .await
            .map_err(|e| Error::http_resolve(original, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_resolve(original, format!("HTTP {status}")));
        }

        let mut hasher = Sha256::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::http_resolve(original, format!("read failed: {e}")))?
        {
            hasher.update(&chunk);
        }
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }
}

/// `/{owner}/{repo}/releases/download/{tag}/{asset}`
fn parse_release_download_path(path: &str) -> Option<(&str, &str, &str, &str)> {
    let mut segments = path.trim_start_matches('/').split('/');
    let owner = segments.next()?;
    let repo = segments.next()?;
    if segments.next()? != "releases" || segments.next()? != "download" {
        return None;
    }
    let tag = segments.next()?;
    let asset = segments.next()?;
    if segments.next().is_some() || owner.is_empty() || asset.is_empty() {
        return None;
    }
    Some((owner, repo, tag, asset))
}

/// Virtual-hosted or path-style object-store endpoints
/// (`bucket.s3.region.amazonaws.com`, `s3.amazonaws.com`, ...).
fn is_object_store_host(host: &str) -> bool {
    if !host.ends_with(".amazonaws.com") {
        return false;
    }
    host.starts_with("s3.") || host.starts_with("s3-") || host.contains(".s3.") || host.contains(".s3-")
}

/// Object stores encode the sha256 in base64; attrs carry it as hex.
fn decode_object_store_checksum(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    Some(format!("sha256:{}", hex::encode(bytes)))
}
