//! HTTP source checksum resolution.
//!
//! Resolves a URL to the sha256 checksum the build engine will verify,
//! trying cheap metadata paths before paying for a full download:
//!
//! 1. Known raw-content hosts expose the checksum as a bare-hex `ETag`
//! 2. Known release-hosting APIs publish asset digests out of band
//! 3. Known object stores return a checksum header on request
//! 4. Fallback: download the body and hash it - by construction the same
//!    bytes the engine will fetch at build time
//!
//! A separate metadata probe captures the response `Vary` header (so
//! content-negotiated responses stay reproducible) and cache volatility
//! signals (surfaced as advisories, never errors).

mod resolver;
mod strategies;

pub use resolver::{HttpOptions, HttpResolver};
