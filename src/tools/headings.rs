//! Heading tagger: promote detected heading candidates to tagged heading
//! elements.
//!
//! Candidate levels come from the font-size heuristic applied at load time
//! (relative to the document's median text size). This tool confirms each
//! candidate in the step's target set, clamping levels to H1–H3, which is
//! the range the original detection assigns.

use super::{StepResult, ToolFailure};
use crate::document::{Document, NodeId};
use crate::error::StepError;
use crate::index::StructureIndex;
use crate::plan::{RemediationStep, StepTarget, ToolKind};

pub(super) fn execute(
    step: &RemediationStep,
    doc: &mut Document,
    index: &StructureIndex,
) -> Result<StepResult, ToolFailure> {
    let targets: Vec<NodeId> = match &step.target {
        StepTarget::Nodes(ids) => ids.clone(),
        StepTarget::DocumentScope => index.untagged_headings().map(|h| h.id).collect(),
    };

    if targets.is_empty() {
        return Err(ToolFailure::Recoverable(StepError::TargetMissing {
            detail: "no heading candidates in target".to_string(),
        }));
    }

    let levels: Vec<(NodeId, u8)> = index
        .headings()
        .iter()
        .filter(|h| targets.contains(&h.id))
        .map(|h| (h.id, h.level))
        .collect();

    let mut writer = index.writer(doc, ToolKind::HeadingTagger, step.target.clone())?;
    let mut changed = Vec::with_capacity(levels.len());
    for (id, level) in levels {
        changed.push(writer.tag_heading(id, level)?);
    }

    Ok(StepResult {
        summary: format!("tagged {} heading(s)", changed.len()),
        nodes_changed: changed,
    })
}
