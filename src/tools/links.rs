//! Link-text fixer: accessible text for link annotations.
//!
//! Screen readers announce a link's contents entry; a bare rectangle over
//! blue text announces nothing. The synthesised text is derived from the
//! URI so it stays truthful even without surrounding-context analysis.

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
        StepTarget::DocumentScope => index.links_missing_text().map(|l| l.id).collect(),
    };

    if targets.is_empty() {
        return Err(ToolFailure::Recoverable(StepError::TargetMissing {
            detail: "no links in target".to_string(),
        }));
    }

    let texts: Vec<(NodeId, String)> = index
        .links()
        .iter()
        .filter(|l| targets.contains(&l.id) && !l.has_text)
        .map(|l| (l.id, link_text_for_uri(l.uri.as_deref())))
        .collect();

    let mut writer = index.writer(doc, ToolKind::LinkTextFixer, step.target.clone())?;
    let mut changed = Vec::with_capacity(texts.len());
    for (id, text) in texts {
        changed.push(writer.set_link_text(id, text)?);
    }

    Ok(StepResult {
        summary: format!("fixed {} link(s)", changed.len()),
        nodes_changed: changed,
    })
}

/// Synthesise accessible link text from a URI.
///
/// `mailto:` and `http(s)` URIs get a human phrasing; anything else is
/// reported verbatim, truncated so a pathological URI cannot flood the
/// annotation.
pub fn link_text_for_uri(uri: Option<&str>) -> String {
    let Some(uri) = uri else {
        return "Link".to_string();
    };

    if let Some(email) = uri.strip_prefix("mailto:") {
        return format!("Email link to {email}");
    }

    if let Some(rest) = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
    {
        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, path.trim_end_matches('/')),
            None => (rest, ""),
        };
        let domain = host.trim_start_matches("www.");
        return if path.is_empty() {
            format!("Link to {domain}")
        } else {
            format!("Link to {path} on {domain}")
        };
    }

    format!("Link: {}", truncate(uri, 50))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
