//! Reference extraction from Dockerfile-style build instructions.
//!
//! This crate is the extraction collaborator of the pinning engine: it
//! reduces build-instruction text to an ordered stream of build-stage
//! declarations and raw source references ([`sourcepin_core::reference`]).
//! It deliberately understands only the instructions that can introduce a
//! remote source:
//!
//! - `FROM <image> [AS <stage>]`
//! - `COPY --from=<ref> ...`
//! - `ADD [--checksum=...] <url>... <dest>`
//!
//! Everything else (RUN, ENV, heredocs, ...) is passed over. Variable
//! expansion is never attempted - references containing `$` tokens are
//! extracted verbatim and skipped later by the classifier.

mod scanner;

pub use scanner::{extract_file, extract_source};
