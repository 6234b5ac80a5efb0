//! Image reference resolution against container registries.
//!
//! Resolves a tag reference to its manifest digest by fetching the raw
//! manifest and recomputing the digest locally - the digest a registry (or
//! anything between us and it) claims is never trusted. Optionally
//! substitutes a hardened-mirror reference for official images first,
//! falling back to the original registry when the mirror has no match.

mod auth;
mod hardened;
mod resolver;

pub use hardened::{DEFAULT_HARDENED_REGISTRY, HardenedMirror};
pub use resolver::{ImageResolver, RegistryOptions};
