//! The run loop: classify, dispatch, dedupe, assemble.

use futures::stream::{self, StreamExt, TryStreamExt};
use sourcepin_core::classify::{ClassifyContext, Disposition, classify};
use sourcepin_core::policy::{PolicyDocument, PolicyRule};
use sourcepin_core::reference::{Entry, RawSourceRef, SourceFile, SourceKind};
use sourcepin_core::resolve::{GitResolve, HttpResolve, ImageResolve, Warning};
use sourcepin_core::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Default number of in-flight resolutions.
const DEFAULT_CONCURRENCY: usize = 8;

/// A complete run result: the document plus advisories gathered along the
/// way. Warnings never block the document.
#[derive(Debug, Clone)]
pub struct PinReport {
    /// The assembled policy document.
    pub policy: PolicyDocument,
    /// Non-fatal advisories, in rule order.
    pub warnings: Vec<Warning>,
}

/// Assembles a policy document from extracted references.
pub struct Pinner {
    image: Arc<dyn ImageResolve>,
    http: Arc<dyn HttpResolve>,
    git: Arc<dyn GitResolve>,
    concurrency: usize,
}

impl Pinner {
    /// Create an assembler over the given resolvers.
    #[must_use]
    pub fn new(
        image: Arc<dyn ImageResolve>,
        http: Arc<dyn HttpResolve>,
        git: Arc<dyn GitResolve>,
    ) -> Self {
        Self {
            image,
            http,
            git,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap the number of concurrent resolutions.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run over all inputs and assemble the policy document.
    ///
    /// Inputs are processed in the order supplied; rule order is the
    /// first-seen order of the original reference text across all inputs.
    /// The first resolver error aborts the whole run.
    pub async fn generate_policy(
        &self,
        inputs: &[SourceFile],
        cancel: &CancellationToken,
    ) -> Result<PinReport> {
        let plan = build_plan(inputs);
        debug!(references = plan.len(), "resolution plan built");

        // `buffered` preserves plan order and `try_collect` drops all
        // in-flight resolutions at the first error.
        let outcomes: Vec<Outcome> = stream::iter(plan.iter().map(|r| self.resolve_one(r, cancel)))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut policy = PolicyDocument::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            policy.push(outcome.rule);
            warnings.extend(outcome.warning);
        }

        info!(
            rules = policy.len(),
            warnings = warnings.len(),
            "assembled source policy"
        );
        Ok(PinReport { policy, warnings })
    }

    async fn resolve_one(&self, reference: &RawSourceRef, cancel: &CancellationToken) -> Result<Outcome> {
        let original = reference.original.as_str();
        match reference.kind {
            SourceKind::Image => {
                let resolved = self
                    .image
                    .resolve(original, cancel)
                    .await
                    .map_err(|e| e.in_file(&reference.file))?;
                Ok(Outcome {
                    rule: PolicyRule::convert_image(original, &resolved.pinned()),
                    warning: None,
                })
            }
            SourceKind::Http => {
                let resolution = self
                    .http
                    .resolve(original, cancel)
                    .await
                    .map_err(|e| e.in_file(&reference.file))?;
                let warning = resolution.volatile.map(|reason| Warning::VolatileContent {
                    url: original.to_string(),
                    reason,
                });
                Ok(Outcome {
                    rule: PolicyRule::convert_http(original, &resolution.checksum, &resolution.headers),
                    warning,
                })
            }
            SourceKind::Git => {
                let (url, gitref) = split_git_reference(original);
                let commit = self
                    .git
                    .resolve(url, gitref, cancel)
                    .await
                    .map_err(|e| e.in_file(&reference.file))?;
                Ok(Outcome {
                    rule: PolicyRule::convert_git(original, &commit),
                    warning: None,
                })
            }
        }
    }
}

struct Outcome {
    rule: PolicyRule,
    warning: Option<Warning>,
}

/// Single-threaded classification pass: folds stage declarations into the
/// classifier context (per file) and the seen-set (across files), producing
/// the ordered list of references that need network resolution.
fn build_plan(inputs: &[SourceFile]) -> Vec<RawSourceRef> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut plan = Vec::new();

    for file in inputs {
        let mut ctx = ClassifyContext::new();
        for entry in &file.entries {
            match entry {
                Entry::Stage(name) => ctx.declare_stage(name),
                Entry::Reference(reference) => match classify(reference, &ctx) {
                    // Skip decisions can depend on per-file context (stage
                    // names), so skips never enter the cross-file seen-set.
                    Disposition::Skip(reason) => {
                        debug!(
                            original = %reference.original,
                            file = %reference.file.display(),
                            line = reference.line,
                            %reason,
                            "skipping reference"
                        );
                    }
                    Disposition::ResolveAsImage
                    | Disposition::ResolveAsHttp
                    | Disposition::ResolveAsGit => {
                        // First occurrence wins; later duplicates are no-ops.
                        if seen.insert(reference.original.clone()) {
                            plan.push(reference.clone());
                        } else {
                            trace!(original = %reference.original, "duplicate reference");
                        }
                    }
                },
            }
        }
    }

    plan
}

/// Split `url#ref` into its address and ref parts; no fragment means the
/// remote HEAD.
fn split_git_reference(original: &str) -> (&str, &str) {
    match original.split_once('#') {
        Some((url, gitref)) => (url, gitref),
        None => (original, ""),
    }
}
