//! Policy assembly.
//!
//! The assembler walks extracted references in input order, classifies each
//! one, dispatches it to the matching resolver, and appends one rule per
//! newly-seen original reference. Classification runs single-threaded (it
//! owns the seen-set); resolution runs with bounded concurrency that
//! preserves plan order, so the emitted document is deterministic no matter
//! how resolution latencies interleave. The first fatal resolver error
//! aborts the run - no partial document ever escapes.

mod assembler;

pub use assembler::{PinReport, Pinner};
