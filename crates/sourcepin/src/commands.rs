//! Subcommand execution.

use sourcepin_core::reference::SourceFile;
use sourcepin_core::{Error, Result};
use sourcepin_extract::{extract_file, extract_source};
use sourcepin_git::GitResolver;
use sourcepin_http::{HttpOptions, HttpResolver};
use sourcepin_pin::Pinner;
use sourcepin_registry::{HardenedMirror, ImageResolver, RegistryOptions};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::PinArgs;

/// Label used for references extracted from standard input.
const STDIN_LABEL: &str = "<stdin>";

/// Run `sourcepin pin`: extract, resolve, emit.
///
/// Advisory warnings go to stderr; the document is written only when the
/// whole run succeeded.
pub async fn pin(args: PinArgs, cancel: &CancellationToken) -> Result<()> {
    let inputs = read_inputs(&args)?;

    let pinner = Pinner::new(
        Arc::new(ImageResolver::new(registry_options(&args))),
        Arc::new(HttpResolver::new(HttpOptions::from_env())),
        Arc::new(GitResolver::new()),
    )
    .with_concurrency(args.concurrency);

    let report = pinner.generate_policy(&inputs, cancel).await?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }

    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            report.policy.write_to(&mut file)?;
            debug!(output = %path.display(), rules = report.policy.len(), "wrote policy");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            report.policy.write_to(&mut stdout)?;
        }
    }

    Ok(())
}

fn registry_options(args: &PinArgs) -> RegistryOptions {
    let mut options = RegistryOptions::from_env();
    if args.hardened_mirror {
        let mirror = args
            .mirror_registry
            .as_deref()
            .map_or_else(HardenedMirror::default, HardenedMirror::new);
        options = options.with_hardened_mirror(mirror);
    }
    options
}

fn read_inputs(args: &PinArgs) -> Result<Vec<SourceFile>> {
    args.dockerfiles
        .iter()
        .map(|path| {
            if path.as_os_str() == "-" {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .map_err(|e| Error::extract(STDIN_LABEL, format!("cannot read stdin: {e}")))?;
                extract_source(Path::new(STDIN_LABEL), &text)
            } else {
                extract_file(path)
            }
        })
        .collect()
}
