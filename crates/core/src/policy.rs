//! Source policy document model and serialization.
//!
//! A policy document is an ordered list of rewrite rules consumed by the
//! build engine. Rule order is the first-seen order of the original
//! reference text across all inputs; attrs use a `BTreeMap` so repeated
//! runs over unchanged inputs serialize byte-identically.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Identifier scheme the engine uses for container images.
pub const DOCKER_IMAGE_SCHEME: &str = "docker-image://";
/// Attr carrying the content checksum of an HTTP source.
pub const ATTR_HTTP_CHECKSUM: &str = "http.checksum";
/// Attr carrying the pinned commit of a git source.
pub const ATTR_GIT_CHECKSUM: &str = "git.checksum";
/// Prefix for captured request-header attrs on HTTP sources.
pub const ATTR_HTTP_HEADER_PREFIX: &str = "http.header.";

/// Rewrite action. Only conversion is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Rewrite the matched source in place.
    Convert,
}

/// Matches a source by its identifier exactly as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// `<scheme>://<original-as-written>`.
    pub identifier: String,
}

/// The rewrite applied to a matched source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// The replacement identifier.
    pub identifier: String,
    /// Source attributes (checksums, captured headers).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

/// One declarative rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rewrite action.
    pub action: Action,
    /// What to match.
    pub selector: Selector,
    /// What to rewrite it to.
    pub updates: Update,
}

impl PolicyRule {
    /// Rule pinning an image reference to a digest-qualified reference.
    ///
    /// `original` is the reference as written; `pinned` the normalized,
    /// digest-qualified reference actually resolved (which differs from the
    /// original under hardened-mirror substitution).
    #[must_use]
    pub fn convert_image(original: &str, pinned: &str) -> Self {
        Self {
            action: Action::Convert,
            selector: Selector {
                identifier: format!("{DOCKER_IMAGE_SCHEME}{original}"),
            },
            updates: Update {
                identifier: format!("{DOCKER_IMAGE_SCHEME}{pinned}"),
                attrs: BTreeMap::new(),
            },
        }
    }

    /// Rule pinning an HTTP URL to a content checksum.
    ///
    /// The identifier stays the URL as written; the checksum and any
    /// captured negotiation headers travel as attrs.
    #[must_use]
    pub fn convert_http(url: &str, checksum: &str, headers: &BTreeMap<String, String>) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(ATTR_HTTP_CHECKSUM.to_string(), checksum.to_string());
        for (name, value) in headers {
            attrs.insert(format!("{ATTR_HTTP_HEADER_PREFIX}{name}"), value.clone());
        }
        Self {
            action: Action::Convert,
            selector: Selector {
                identifier: url.to_string(),
            },
            updates: Update {
                identifier: url.to_string(),
                attrs,
            },
        }
    }

    /// Rule pinning a git reference to a commit id.
    #[must_use]
    pub fn convert_git(original: &str, commit: &str) -> Self {
        let identifier = git_identifier(original);
        let mut attrs = BTreeMap::new();
        attrs.insert(ATTR_GIT_CHECKSUM.to_string(), commit.to_string());
        Self {
            action: Action::Convert,
            selector: Selector {
                identifier: identifier.clone(),
            },
            updates: Update { identifier, attrs },
        }
    }
}

/// Give scheme-less SCP-like git references an explicit scheme; everything
/// else already carries one.
fn git_identifier(original: &str) -> String {
    let address = original.split('#').next().unwrap_or(original);
    if address.contains("://") {
        original.to_string()
    } else {
        format!("git://{original}")
    }
}

/// Ordered, deduplicated rewrite rules for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Rules in first-seen order of their original reference.
    pub rules: Vec<PolicyRule>,
}

impl PolicyDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Uniqueness of originals is the assembler's job.
    pub fn push(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rules were emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Serialize as two-space-indented JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Serialize the full document to a writer. All-or-nothing: the
    /// document is rendered in memory first so a write failure never
    /// leaves a truncated rendering of a half-serialized document mixed
    /// with caller output.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let rendered = self.to_json()?;
        writer.write_all(rendered.as_bytes()).map_err(Error::Io)
    }
}
