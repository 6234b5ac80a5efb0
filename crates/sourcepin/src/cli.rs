//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// Exit code for any fatal error.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for interruption (128 + SIGINT).
pub const EXIT_SIGINT: i32 = 130;

/// Pin container build sources to immutable, content-addressed identifiers.
#[derive(Debug, Parser)]
#[command(name = "sourcepin", version, about)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve every mutable source reference and emit a source policy.
    Pin(PinArgs),
}

/// Arguments for `sourcepin pin`.
#[derive(Debug, Args)]
pub struct PinArgs {
    /// Dockerfiles to scan; `-` reads standard input.
    #[arg(required = true, value_name = "DOCKERFILE")]
    pub dockerfiles: Vec<PathBuf>,

    /// Write the policy document to a file instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Resolve official images against the hardened mirror first, falling
    /// back to the original registry when the mirror has no match.
    #[arg(long)]
    pub hardened_mirror: bool,

    /// Hardened mirror registry host.
    #[arg(long, value_name = "HOST", requires = "hardened_mirror")]
    pub mirror_registry: Option<String>,

    /// Maximum number of concurrent resolutions.
    #[arg(long, default_value_t = 8, value_name = "N")]
    pub concurrency: usize,
}
