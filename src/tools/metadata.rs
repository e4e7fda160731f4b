//! Metadata writer: title, language, viewer preferences.
//!
//! Title derivation mirrors what a human remediator does: the most prominent
//! heading candidate on the earliest page is almost always the document
//! title. Only when no candidate exists does the configured fallback apply,
//! so re-planning after this step always finds a title in place.

use super::{ExecutionContext, StepResult, ToolFailure};
use crate::document::Document;
use crate::index::StructureIndex;
use crate::plan::{RemediationStep, ToolKind};

pub(super) fn execute(
    step: &RemediationStep,
    doc: &mut Document,
    index: &StructureIndex,
    ctx: &ExecutionContext<'_>,
) -> Result<StepResult, ToolFailure> {
    let meta = index.metadata().clone();
    let mut writer = index.writer(doc, ToolKind::MetadataWriter, step.target.clone())?;
    let mut applied: Vec<&str> = Vec::new();

    if meta.title.is_none() {
        let title = derive_title(index)
            .unwrap_or_else(|| ctx.config.default_title.clone());
        writer.set_title(title)?;
        applied.push("title");
    }

    if meta.language.is_none() {
        writer.set_language(ctx.config.default_language.clone())?;
        applied.push("language");
    }

    if !meta.display_doc_title {
        writer.set_display_doc_title(true)?;
        applied.push("display-doc-title");
    }

    Ok(StepResult {
        nodes_changed: Vec::new(),
        summary: if applied.is_empty() {
            "metadata already complete".to_string()
        } else {
            format!("set {}", applied.join(", "))
        },
    })
}

/// Largest-font heading candidate on the earliest page, if its text is
/// substantial enough to serve as a title.
fn derive_title(index: &StructureIndex) -> Option<String> {
    index
        .headings()
        .iter()
        .filter(|h| h.text.trim().len() > 3)
        .min_by(|a, b| {
            a.page
                .cmp(&b.page)
                .then(b.font_size.total_cmp(&a.font_size))
        })
        .map(|h| h.text.trim().to_string())
}
