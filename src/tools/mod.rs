//! Remediation tools: one module per tool kind, one uniform contract.
//!
//! Every concrete tool implements the same capability — run one plan step
//! against the current structure index, mutating document state through a
//! scoped writer — and is selected by an exhaustiveness-checked `match` on
//! [`ToolKind`], never by string lookup. Adding a tool kind without wiring
//! it here is a compile error.
//!
//! Side effects are confined by construction: the executor builds the
//! [`crate::index::IndexWriter`] from the step's declared target, so a tool
//! physically cannot reach nodes outside its scope.

use crate::cancel::CancelFlag;
use crate::config::RemediationConfig;
use crate::describe::AltTextGenerator;
use crate::document::{Document, NodeId};
use crate::error::{RemediateError, StepError};
use crate::index::StructureIndex;
use crate::plan::{RemediationStep, ToolKind};
use tracing::debug;

mod figures;
mod headings;
mod links;
mod metadata;
mod tagger;

pub use links::link_text_for_uri;

/// Successful outcome of one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Nodes the tool changed, in the order it changed them. Empty for
    /// document-scope work (metadata, tagging).
    pub nodes_changed: Vec<NodeId>,
    /// One-line human summary for logs and step reports.
    pub summary: String,
}

/// Failure of one step, classified by the tool itself.
#[derive(Debug)]
pub enum ToolFailure {
    /// Skip this step, continue the plan, record in the final report.
    Recoverable(StepError),
    /// Abort remaining plan steps; mutations already applied are retained.
    Fatal(StepError),
    /// Invariant violation (stale index, scope breach): always fatal and
    /// carries the typed pipeline error.
    Invariant(RemediateError),
}

impl From<RemediateError> for ToolFailure {
    fn from(e: RemediateError) -> Self {
        ToolFailure::Invariant(e)
    }
}

/// Shared context handed to every tool invocation.
pub struct ExecutionContext<'a> {
    pub config: &'a RemediationConfig,
    /// Present when the plan contains an alt-text step.
    pub describer: Option<&'a AltTextGenerator>,
    pub cancel: &'a CancelFlag,
}

/// Run one remediation step.
///
/// Dispatch is the tagged-variant table: each arm hands the step to the one
/// module implementing that capability. Only the alt-text arm awaits
/// network I/O; the rest are pure model mutations.
pub async fn execute_step(
    step: &RemediationStep,
    doc: &mut Document,
    index: &StructureIndex,
    ctx: &ExecutionContext<'_>,
) -> Result<StepResult, ToolFailure> {
    debug!("Executing step '{}'", step.tool);
    match step.tool {
        ToolKind::MetadataWriter => metadata::execute(step, doc, index, ctx),
        ToolKind::StructureTagger => tagger::execute(step, doc, index),
        ToolKind::HeadingTagger => headings::execute(step, doc, index),
        ToolKind::LinkTextFixer => links::execute(step, doc, index),
        ToolKind::AltTextInjector => figures::execute(step, doc, index, ctx).await,
    }
}
