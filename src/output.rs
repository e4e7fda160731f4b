//! Result types for remediation runs.
//!
//! A run always produces a [`RemediationOutput`] unless it failed before any
//! mutation (malformed report, planning error). Fatal tool failures and
//! cancellation still return an output — with state [`RunState::Aborted`],
//! the step reports collected so far, and the mutated document retained —
//! because partial mutations are part of the contract, not an error to hide.

use crate::document::Document;
use crate::error::{RemediateError, StepError};
use crate::plan::ToolKind;
use crate::score::ScoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State machine of one remediation run.
///
/// `Planned → Executing → Validating → Done | PartiallyFailed`, with
/// `Aborted` reachable from `Executing` on a fatal tool failure or
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Planned,
    Executing,
    Validating,
    /// Every step applied cleanly.
    Done,
    /// A score was produced, but at least one recoverable failure occurred.
    PartiallyFailed,
    /// A fatal failure or cancellation stopped the plan; mutations already
    /// applied are retained.
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Planned => "planned",
            RunState::Executing => "executing",
            RunState::Validating => "validating",
            RunState::Done => "done",
            RunState::PartiallyFailed => "partially-failed",
            RunState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum StepOutcome {
    Applied {
        nodes_changed: usize,
        summary: String,
    },
    Failed {
        error: StepError,
        fatal: bool,
    },
}

/// One entry in the executed-step list returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub tool: ToolKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }
}

/// Everything a remediation run returns.
#[derive(Debug)]
pub struct RemediationOutput {
    pub state: RunState,
    /// Score before any mutation.
    pub pre_score: ScoreResult,
    /// Score after re-validation. `None` only for aborted runs, which never
    /// reach the validating state.
    pub post_score: Option<ScoreResult>,
    /// Reports for steps that were dispatched, in plan order. Steps after a
    /// fatal failure are absent, not marked skipped.
    pub steps: Vec<StepReport>,
    /// The mutated document handle. Present for aborted runs too: partial
    /// mutations are retained, not rolled back.
    pub document: Document,
}

impl RemediationOutput {
    /// Convert to a hard `Result` for callers that treat anything short of a
    /// clean run as an error.
    pub fn into_result(self) -> Result<Self, RemediateError> {
        match self.state {
            RunState::Done | RunState::PartiallyFailed => Ok(self),
            RunState::Aborted => {
                let fatal = self.steps.iter().rev().find_map(|s| match &s.outcome {
                    StepOutcome::Failed { error, fatal: true } => {
                        Some((s.tool, error.clone()))
                    }
                    _ => None,
                });
                match fatal {
                    Some((tool, source)) => Err(RemediateError::FatalStep { tool, source }),
                    None => Err(RemediateError::Cancelled {
                        completed_steps: self.steps.len(),
                    }),
                }
            }
            // Intermediate states never escape the orchestrator.
            other => Err(RemediateError::Internal(format!(
                "run returned in intermediate state '{other}'"
            ))),
        }
    }
}
