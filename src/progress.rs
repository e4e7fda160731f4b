//! Progress-callback trait for per-step remediation events.
//!
//! Inject an `Arc<dyn RemediationProgress>` via
//! [`crate::config::RemediationConfigBuilder::progress`] to receive
//! real-time events as the orchestrator dispatches each plan step.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: shells can
//! forward events to a broadcast channel, a WebSocket, a job record, or a
//! terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so it holds
//! up when the alt-text step fans out across worker threads.

use crate::output::RunState;
use crate::plan::ToolKind;

/// Called by the orchestrator as it executes a remediation plan.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Step events arrive strictly in plan order (step
/// execution is sequential); only the internal fan-out of a single step is
/// concurrent.
pub trait RemediationProgress: Send + Sync {
    /// Called once after planning, before any step runs.
    fn on_run_start(&self, total_steps: usize) {
        let _ = total_steps;
    }

    /// Called just before a step is dispatched.
    fn on_step_start(&self, tool: ToolKind, step: usize, total_steps: usize) {
        let _ = (tool, step, total_steps);
    }

    /// Called when a step applies cleanly.
    fn on_step_complete(&self, tool: ToolKind, nodes_changed: usize) {
        let _ = (tool, nodes_changed);
    }

    /// Called when a step fails, recoverably or fatally.
    fn on_step_failed(&self, tool: ToolKind, error: &str, fatal: bool) {
        let _ = (tool, error, fatal);
    }

    /// Called once with the final run state.
    fn on_run_complete(&self, state: RunState) {
        let _ = state;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl RemediationProgress for NoopProgress {}
