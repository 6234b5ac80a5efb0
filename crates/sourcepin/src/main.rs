//! sourcepin CLI.
//!
//! Scans container build instructions, resolves every mutable source
//! reference (image tags, HTTP URLs, git refs) to an immutable
//! content-addressed identifier, and emits a source policy the build engine
//! applies at build time. Builds stay reproducible without editing a single
//! Dockerfile.

// The CLI binary owns stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command, EXIT_FAILURE, EXIT_OK, EXIT_SIGINT};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    // Ctrl-C cancels in-flight resolutions; the run surfaces it as a
    // cancellation error, never as a partial document.
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Command::Pin(args) => commands::pin(args, &cancel).await,
    };

    let exit_code = match result {
        Ok(()) => EXIT_OK,
        Err(err) if err.is_cancelled() => {
            eprintln!("interrupted");
            EXIT_SIGINT
        }
        Err(err) => {
            eprintln!("{:?}", miette::Report::msg(err));
            EXIT_FAILURE
        }
    };
    std::process::exit(exit_code);
}

/// Logs go to stderr so the policy document owns stdout.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
