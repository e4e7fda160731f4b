//! Error types for the pdfua-remediate library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RemediateError`] — **Fatal**: the pipeline run cannot proceed at all
//!   (malformed validator report, inconsistent tool dependency table, stale
//!   structure index). Returned as `Err(RemediateError)` from the top-level
//!   orchestrator functions.
//!
//! * [`StepError`] — **Non-fatal when classified Recoverable**: a single
//!   remediation step failed but the rest of the plan is fine. Stored inside
//!   [`crate::output::StepReport`] so callers can inspect partial success
//!   rather than losing the whole run to one bad step.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! step failure, log and continue, or collect all failures for a post-run
//! report. Classification into Recoverable/Fatal happens at the executor
//! boundary via [`crate::tools::ToolFailure`].

use crate::plan::ToolKind;
use thiserror::Error;

/// All fatal errors returned by the pdfua-remediate library.
///
/// Step-level failures use [`StepError`] and are stored in
/// [`crate::output::StepReport`] rather than propagated here, unless a tool
/// classified them as fatal.
#[derive(Debug, Error)]
pub enum RemediateError {
    // ── Report errors ─────────────────────────────────────────────────────
    /// The validator output does not match the expected shape.
    ///
    /// Surfaced before scoring; a run is aborted rather than scored against
    /// a report we cannot trust.
    #[error("Malformed validator report: {detail}")]
    MalformedReport { detail: String },

    /// The external validator could not be invoked at all.
    #[error("Validator invocation failed: {detail}")]
    ValidatorUnavailable { detail: String },

    /// The external validator exceeded its time budget.
    #[error("Validation timed out after {secs}s")]
    ValidatorTimeout { secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The document bytes could not be parsed by the PDF backend.
    #[error("Cannot parse document: {detail}")]
    CorruptDocument { detail: String },

    /// Serialising the mutated document back to bytes failed.
    #[error("Cannot persist document: {detail}")]
    PersistFailed { detail: String },

    // ── Index errors ──────────────────────────────────────────────────────
    /// A write was attempted through an index built against an earlier
    /// document epoch. Always a programming defect: the orchestrator must
    /// rebuild the index after any identity-shifting mutation.
    #[error("Stale structure index: built at epoch {index_epoch}, document is at epoch {document_epoch}")]
    StaleIndex {
        index_epoch: u64,
        document_epoch: u64,
    },

    /// A tool wrote outside the subtree its step declared as target.
    /// Enforced by construction in the scoped writer; hitting this means a
    /// tool implementation is broken.
    #[error("Tool '{tool}' attempted a write outside its declared target scope")]
    ScopeViolation { tool: ToolKind },

    // ── Planning errors ───────────────────────────────────────────────────
    /// A requested goal has no tool capable of producing it.
    /// Raised before any mutation occurs.
    #[error("No remediation tool can satisfy goal '{goal}'")]
    UnsatisfiableGoal { goal: String },

    /// The static tool dependency table is inconsistent. This is a
    /// configuration defect, reported rather than silently broken.
    #[error("Tool dependency table contains a cycle involving '{tool}'")]
    CyclicDependency { tool: ToolKind },

    // ── Execution errors ──────────────────────────────────────────────────
    /// A tool failure classified as fatal; remaining plan steps were not run.
    /// Mutations applied by earlier steps are retained (remediation is not
    /// transactional).
    #[error("Step '{tool}' failed fatally: {source}")]
    FatalStep {
        tool: ToolKind,
        #[source]
        source: StepError,
    },

    /// The run was cancelled between steps.
    #[error("Remediation run cancelled after {completed_steps} step(s)")]
    Cancelled { completed_steps: usize },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured inference provider is not initialised (missing API
    /// key etc.).
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single remediation step.
///
/// Stored in [`crate::output::StepReport`] when recoverable; wrapped in
/// [`RemediateError::FatalStep`] when the tool classified it as fatal.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StepError {
    /// The step's target nodes no longer exist in the index.
    #[error("Target node(s) missing from index: {detail}")]
    TargetMissing { detail: String },

    /// The inference call failed for every figure in the step.
    #[error("Description generation failed for all {figures} figure(s): {detail}")]
    AllDescriptionsFailed { figures: usize, detail: String },

    /// Some figures in the step could not be described after retries.
    #[error("{failed}/{total} figure(s) left without a description")]
    DescriptionsIncomplete { failed: usize, total: usize },

    /// The backend rejected the mutation.
    #[error("Document mutation failed: {detail}")]
    MutationFailed { detail: String },

    /// The tool hit an unexpected internal condition.
    #[error("Tool error: {detail}")]
    Tool { detail: String },
}
