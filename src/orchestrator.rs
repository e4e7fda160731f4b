//! Pipeline orchestration: the one component that sees a whole remediation
//! lifecycle.
//!
//! Every other module is a pure transformation over explicit inputs; the
//! orchestrator sequences them: validate → score → index → plan → execute
//! steps in order → re-validate → re-score. It owns the partial-failure
//! policy (fatal aborts, recoverable continues) and the only mutation
//! lifecycle a document goes through.
//!
//! ## State machine
//!
//! `Planned → Executing → Validating → Done | PartiallyFailed`, with
//! `Aborted` on a fatal tool failure or cancellation. Aborted runs skip
//! re-validation and return the mutations applied so far — remediation is
//! not transactional, and the partial document is often still an
//! improvement.

use crate::backend;
use crate::cancel::CancelFlag;
use crate::config::RemediationConfig;
use crate::describe::AltTextGenerator;
use crate::document::Document;
use crate::error::RemediateError;
use crate::index::StructureIndex;
use crate::output::{RemediationOutput, RunState, StepOutcome, StepReport};
use crate::plan::{self, RemediationGoal, ToolKind};
use crate::prompts::DEFAULT_DOCUMENT_TYPE;
use crate::report::parse_report;
use crate::score::{score, ScoreResult};
use crate::tools::{self, ExecutionContext, ToolFailure};
use crate::validate::StructuralValidator;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives remediation runs. Construct once with a config and a validator;
/// every run takes a fresh document handle.
pub struct Orchestrator {
    config: RemediationConfig,
    validator: Arc<dyn StructuralValidator>,
}

impl Orchestrator {
    pub fn new(config: RemediationConfig, validator: Arc<dyn StructuralValidator>) -> Self {
        Self { config, validator }
    }

    /// Validate and score a document without mutating it.
    pub async fn run_validation_only(
        &self,
        doc: &Document,
    ) -> Result<ScoreResult, RemediateError> {
        self.validate_and_score(doc).await
    }

    /// Run remediation for the given goals.
    ///
    /// `document_type_hint` feeds the description prompts ("academic paper",
    /// "textbook", …); `None` uses a neutral default.
    pub async fn run_remediation(
        &self,
        doc: Document,
        goals: &[RemediationGoal],
        document_type_hint: Option<&str>,
    ) -> Result<RemediationOutput, RemediateError> {
        self.run_remediation_with_cancel(doc, goals, document_type_hint, CancelFlag::never())
            .await
    }

    /// Like [`Orchestrator::run_remediation`], with cooperative cancellation.
    ///
    /// Cancellation propagates to outstanding inference calls and halts
    /// further step dispatch; mutations already applied are left as-is.
    pub async fn run_remediation_with_cancel(
        &self,
        mut doc: Document,
        goals: &[RemediationGoal],
        document_type_hint: Option<&str>,
        cancel: CancelFlag,
    ) -> Result<RemediationOutput, RemediateError> {
        let run_start = Instant::now();
        info!("Starting remediation run, goals: {goals:?}");

        // ── Pre-remediation validation and score ─────────────────────────
        let pre_score = self.validate_and_score(&doc).await?;
        info!("Pre-remediation score: {}", pre_score.summary());

        // ── Plan ─────────────────────────────────────────────────────────
        let mut index = StructureIndex::build(&doc);
        let (available, provider) = self.available_tools();
        let plan = plan::plan_with_tools(goals, &index, &available)?;
        let mut state = RunState::Planned;
        debug!("Run state: {state}, {} step(s) planned", plan.len());

        if let Some(ref progress) = self.config.progress {
            progress.on_run_start(plan.len());
        }

        // The describer is built once per run so the whole alt-text fan-out
        // shares one pool and one document-type hint.
        let needs_describer = plan
            .steps()
            .iter()
            .any(|s| s.tool == ToolKind::AltTextInjector);
        let describer = if needs_describer {
            let document_type = document_type_hint.unwrap_or(DEFAULT_DOCUMENT_TYPE);
            if let Some(ref backend) = self.config.describe_backend {
                Some(AltTextGenerator::with_backend(
                    Arc::clone(backend),
                    &self.config,
                    document_type,
                ))
            } else {
                let provider = provider.ok_or_else(|| {
                    RemediateError::Internal(
                        "planner emitted an alt-text step without a provider".to_string(),
                    )
                })?;
                Some(AltTextGenerator::new(provider, &self.config, document_type))
            }
        } else {
            None
        };

        // ── Execute steps strictly in plan order ─────────────────────────
        let total_steps = plan.len();
        let mut steps: Vec<StepReport> = Vec::with_capacity(total_steps);
        let mut recoverable_failures = 0usize;
        let mut aborted = false;

        for (step_no, step) in plan.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Run cancelled before step {}/{}", step_no + 1, total_steps);
                aborted = true;
                break;
            }

            if state != RunState::Executing {
                state = RunState::Executing;
                debug!("Run state: {state}");
            }
            if let Some(ref progress) = self.config.progress {
                progress.on_step_start(step.tool, step_no + 1, total_steps);
            }

            let ctx = ExecutionContext {
                config: &self.config,
                describer: describer.as_ref(),
                cancel: &cancel,
            };

            match tools::execute_step(step, &mut doc, &index, &ctx).await {
                Ok(result) => {
                    info!(
                        "Step {}/{} '{}': {}",
                        step_no + 1,
                        total_steps,
                        step.tool,
                        result.summary
                    );
                    if let Some(ref progress) = self.config.progress {
                        progress.on_step_complete(step.tool, result.nodes_changed.len());
                    }
                    steps.push(StepReport {
                        tool: step.tool,
                        outcome: StepOutcome::Applied {
                            nodes_changed: result.nodes_changed.len(),
                            summary: result.summary,
                        },
                    });
                }
                Err(ToolFailure::Recoverable(error)) => {
                    warn!(
                        "Step {}/{} '{}' failed (recoverable): {error}",
                        step_no + 1,
                        total_steps,
                        step.tool
                    );
                    if let Some(ref progress) = self.config.progress {
                        progress.on_step_failed(step.tool, &error.to_string(), false);
                    }
                    recoverable_failures += 1;
                    steps.push(StepReport {
                        tool: step.tool,
                        outcome: StepOutcome::Failed {
                            error,
                            fatal: false,
                        },
                    });
                }
                Err(ToolFailure::Fatal(error)) => {
                    warn!(
                        "Step {}/{} '{}' failed FATALLY: {error} — aborting plan",
                        step_no + 1,
                        total_steps,
                        step.tool
                    );
                    if let Some(ref progress) = self.config.progress {
                        progress.on_step_failed(step.tool, &error.to_string(), true);
                    }
                    steps.push(StepReport {
                        tool: step.tool,
                        outcome: StepOutcome::Failed { error, fatal: true },
                    });
                    aborted = true;
                    break;
                }
                // Invariant violations (stale index, scope breach) are
                // defects, not run outcomes: propagate as hard errors.
                Err(ToolFailure::Invariant(e)) => return Err(e),
            }

            // Identity-shifting steps (structure retagging) invalidate the
            // index; rebuild before the next step sees it.
            if index.epoch() != doc.epoch() {
                debug!("Index stale after '{}', rebuilding", step.tool);
                index = StructureIndex::build(&doc);
            }
        }

        if aborted {
            state = RunState::Aborted;
            if let Some(ref progress) = self.config.progress {
                progress.on_run_complete(state);
            }
            info!(
                "Run aborted after {} step(s) in {:?}",
                steps.len(),
                run_start.elapsed()
            );
            return Ok(RemediationOutput {
                state,
                pre_score,
                post_score: None,
                steps,
                document: doc,
            });
        }

        // ── Re-validate and re-score ─────────────────────────────────────
        state = RunState::Validating;
        debug!("Run state: {state}, re-validating after {} step(s)", steps.len());
        let post_score = self.validate_and_score(&doc).await?;
        info!("Post-remediation score: {}", post_score.summary());

        state = if recoverable_failures == 0 {
            RunState::Done
        } else {
            RunState::PartiallyFailed
        };
        if let Some(ref progress) = self.config.progress {
            progress.on_run_complete(state);
        }
        info!(
            "Run {} in {:?}: {} → {} ({} recoverable failure(s))",
            state,
            run_start.elapsed(),
            pre_score.score,
            post_score.score,
            recoverable_failures
        );

        Ok(RemediationOutput {
            state,
            pre_score,
            post_score: Some(post_score),
            steps,
            document: doc,
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Push the document's current bytes through the external validator,
    /// then parse and score the raw report.
    async fn validate_and_score(&self, doc: &Document) -> Result<ScoreResult, RemediateError> {
        // An unmutated document validates as received; only mutated state
        // needs serialising first.
        let bytes = if doc.revision() == 0 {
            doc.source_bytes().to_vec()
        } else {
            backend::persist_document(doc)?
        };
        let validator = Arc::clone(&self.validator);
        let profile = self.config.profile;
        let secs = self.config.validator_timeout_secs;

        // Validator binaries block on subprocess I/O; keep them off the
        // async workers and under a hard timeout.
        let task = tokio::task::spawn_blocking(move || validator.validate(&bytes, profile));
        let raw = tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| RemediateError::ValidatorTimeout { secs })?
            .map_err(|e| RemediateError::Internal(format!("validator task panicked: {e}")))??;

        let report = parse_report(&raw, &self.config.severity_map)?;
        Ok(score(&report, &self.config.score_policy))
    }

    /// Tools usable in this configuration, plus the resolved provider when
    /// inference is available.
    ///
    /// Without a describe backend or resolvable provider the alt-text
    /// injector is withheld from planning: a `full` goal then remediates
    /// structure and reports figures as outstanding, while an
    /// `alt-text-only` goal fails as unsatisfiable before any mutation.
    fn available_tools(&self) -> (BTreeSet<ToolKind>, Option<Arc<dyn LLMProvider>>) {
        let mut available: BTreeSet<ToolKind> = ToolKind::ALL.into_iter().collect();
        if self.config.describe_backend.is_some() {
            return (available, None);
        }
        match self.resolve_provider() {
            Ok(provider) => (available, Some(provider)),
            Err(e) => {
                warn!("No inference provider, alt-text disabled: {e}");
                available.remove(&ToolKind::AltTextInjector);
                (available, None)
            }
        }
    }

    /// Resolve the inference provider, from most-specific to least-specific:
    /// pre-built provider, then named provider + model, then environment
    /// auto-detection.
    fn resolve_provider(&self) -> Result<Arc<dyn LLMProvider>, RemediateError> {
        if let Some(ref provider) = self.config.provider {
            return Ok(Arc::clone(provider));
        }

        if let Some(ref name) = self.config.provider_name {
            let model = self.config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                RemediateError::ProviderNotConfigured {
                    provider: name.clone(),
                    hint: format!("{e}"),
                }
            });
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| RemediateError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No provider auto-detected from environment.\n\
                     Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure one explicitly.\n\
                     Error: {e}"
                ),
            })?;
        Ok(provider)
    }
}
