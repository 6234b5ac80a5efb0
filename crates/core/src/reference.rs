//! Raw source references as produced by build-instruction extraction.
//!
//! A [`RawSourceRef`] is immutable once extracted: it records the reference
//! text exactly as written, the protocol family it belongs to, and where it
//! came from. Extraction yields an ordered [`Entry`] stream per file so that
//! build-stage declarations interleave with references in source order -
//! the classifier needs to know which stage names were declared *before* a
//! given reference.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Protocol family of a source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Container image reference (`FROM`, `COPY --from`).
    Image,
    /// HTTP(S) URL (`ADD https://...`).
    Http,
    /// Git repository URL plus optional ref (`ADD https://...git#ref`).
    Git,
}

/// The build instruction a reference appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `FROM <ref> [AS <stage>]`
    From,
    /// `COPY --from=<ref> ...`
    CopyFrom,
    /// `ADD <url> <dest>`
    Add,
}

/// A raw reference extracted from build instructions, immutable once built.
#[derive(Debug, Clone)]
pub struct RawSourceRef {
    /// The reference text exactly as written in the instruction.
    pub original: String,
    /// Protocol family.
    pub kind: SourceKind,
    /// Instruction context the reference appeared in.
    pub instruction: Instruction,
    /// Explicit checksum annotation (`ADD --checksum=...`), if present.
    pub checksum: Option<String>,
    /// Source file the reference came from.
    pub file: PathBuf,
    /// 1-based line number of the instruction.
    pub line: usize,
}

/// One item of the ordered extraction stream.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A build-stage declaration (`FROM ... AS <name>`).
    Stage(String),
    /// A raw source reference.
    Reference(RawSourceRef),
}

/// The extraction result for a single input file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path the references were extracted from (display-only for stdin).
    pub path: PathBuf,
    /// Stage declarations and references in source order.
    pub entries: Vec<Entry>,
}

impl SourceFile {
    /// Number of references (stage declarations excluded).
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Reference(_)))
            .count()
    }
}
