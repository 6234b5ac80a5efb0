//! Pure classification of raw references into skip/resolve dispositions.
//!
//! Classification is a side-effect-free decision over reference shape. The
//! only state it consults is the [`ClassifyContext`], which the caller folds
//! stage declarations into as it walks the extraction stream.

use crate::reference::{RawSourceRef, SourceKind};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// The literal base-image marker that names no image at all.
pub const NO_BASE_IMAGE: &str = "scratch";

/// `${VAR}` or `$VAR` - a variable the shell never expanded.
#[allow(clippy::expect_used)]
static UNEXPANDED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}|\$[A-Za-z_][A-Za-z0-9_]*").expect("valid regex"));

/// SCP-like git syntax: `user@host:path`.
#[allow(clippy::expect_used)]
static SCP_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._~-]+@[A-Za-z0-9._-]+:\S+$").expect("valid regex"));

/// Why a reference was skipped rather than resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The no-base marker (`scratch`).
    NoBase,
    /// Reference to a previously declared build stage.
    StageReference,
    /// Purely numeric stage index (`COPY --from=0`).
    StageIndex,
    /// Contains an unexpanded `${...}` or `$NAME` token.
    UnexpandedVariable,
    /// Already pinned: digest-qualified image or checksum-annotated URL.
    AlreadyPinned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoBase => "no base image",
            Self::StageReference => "build stage reference",
            Self::StageIndex => "build stage index",
            Self::UnexpandedVariable => "unexpanded variable",
            Self::AlreadyPinned => "already pinned",
        };
        f.write_str(s)
    }
}

/// Classification outcome for a single raw reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Do not resolve; emit no rule.
    Skip(SkipReason),
    /// Resolve against a container registry.
    ResolveAsImage,
    /// Resolve to an HTTP content checksum.
    ResolveAsHttp,
    /// Resolve to a git commit id.
    ResolveAsGit,
}

/// Stage declarations visible at the current point of the extraction stream.
#[derive(Debug, Default)]
pub struct ClassifyContext {
    stages: HashSet<String>,
}

impl ClassifyContext {
    /// Create an empty context (start of a file).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a build-stage declaration. Stage names match case-insensitively.
    pub fn declare_stage(&mut self, name: &str) {
        self.stages.insert(name.to_ascii_lowercase());
    }

    /// True if `name` matches a previously declared stage.
    #[must_use]
    pub fn is_stage(&self, name: &str) -> bool {
        self.stages.contains(&name.to_ascii_lowercase())
    }
}

/// Decide whether to skip a reference or which resolver to dispatch it to.
#[must_use]
pub fn classify(reference: &RawSourceRef, ctx: &ClassifyContext) -> Disposition {
    if contains_unexpanded_variable(&reference.original) {
        return Disposition::Skip(SkipReason::UnexpandedVariable);
    }

    match reference.kind {
        SourceKind::Image => classify_image(&reference.original, ctx),
        SourceKind::Http => {
            if reference.checksum.is_some() {
                Disposition::Skip(SkipReason::AlreadyPinned)
            } else {
                Disposition::ResolveAsHttp
            }
        }
        SourceKind::Git => Disposition::ResolveAsGit,
    }
}

fn classify_image(original: &str, ctx: &ClassifyContext) -> Disposition {
    if original.eq_ignore_ascii_case(NO_BASE_IMAGE) {
        return Disposition::Skip(SkipReason::NoBase);
    }
    if ctx.is_stage(original) {
        return Disposition::Skip(SkipReason::StageReference);
    }
    if !original.is_empty() && original.bytes().all(|b| b.is_ascii_digit()) {
        return Disposition::Skip(SkipReason::StageIndex);
    }
    if original.contains('@') {
        return Disposition::Skip(SkipReason::AlreadyPinned);
    }
    Disposition::ResolveAsImage
}

/// True if the text contains a literal unexpanded variable token.
#[must_use]
pub fn contains_unexpanded_variable(text: &str) -> bool {
    UNEXPANDED_VARIABLE.is_match(text)
}

/// Protocol disambiguation for URL-shaped references: git wins over HTTP
/// when the URL ends in a git suffix, uses a git-style scheme, or matches
/// SCP-like `user@host:path` syntax.
#[must_use]
pub fn is_git_reference(url: &str) -> bool {
    // The ref fragment is not part of the repository address.
    let address = url.split('#').next().unwrap_or(url);

    if address.starts_with("git://") || address.starts_with("ssh://") {
        return true;
    }
    if address.ends_with(".git") {
        return true;
    }
    // `user@host:path` without a scheme separator.
    !address.contains("://") && SCP_LIKE.is_match(address)
}
