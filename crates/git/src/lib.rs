//! Git ref-to-commit resolution.
//!
//! Resolves `repository URL + ref` to a full commit id from a single remote
//! ref listing. Branches win over tags; annotated tags peel to the commit
//! they ultimately point to; anything else (including partial SHAs) is an
//! error. A ref that already is a full commit id never touches the network.
//!
//! The listing itself is behind the [`LsRemote`] capability trait. The
//! default [`SystemGit`] transport shells out to `git ls-remote` - ref
//! listing is plumbing, and the system git binary already speaks every
//! transport and credential helper the user has configured.

mod resolver;
mod transport;

pub use resolver::GitResolver;
pub use transport::{LsRemote, RemoteRef, SystemGit};
