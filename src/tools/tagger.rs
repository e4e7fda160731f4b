//! Structure tagger: MarkInfo/Marked plus the structure-tree root.
//!
//! This is the one identity-shifting tool: materialising the tag tree can
//! renumber nodes, so the writer is consumed and the orchestrator rebuilds
//! the index before dispatching the next step.
//!
//! It is also the one tool that can fail fatally in normal operation.
//! Materialising the tag tree is the mutation that can render a document
//! unserialisable, so the tagger round-trips the object model once right
//! after tagging. A document that cannot be serialised here would fail
//! every later persist anyway — aborting the plan now, with the partial
//! mutation retained, beats discovering it after the alt-text budget was
//! spent.

use super::{StepResult, ToolFailure};
use crate::backend;
use crate::document::Document;
use crate::error::StepError;
use crate::index::StructureIndex;
use crate::plan::{RemediationStep, ToolKind};

pub(super) fn execute(
    step: &RemediationStep,
    doc: &mut Document,
    index: &StructureIndex,
) -> Result<StepResult, ToolFailure> {
    let writer = index.writer(doc, ToolKind::StructureTagger, step.target.clone())?;
    writer.materialize_structure_root()?;

    if let Err(e) = backend::persist_document(doc) {
        return Err(ToolFailure::Fatal(StepError::MutationFailed {
            detail: format!("document does not serialise after tagging: {e}"),
        }));
    }

    Ok(StepResult {
        nodes_changed: Vec::new(),
        summary: "document marked tagged; structure root materialised".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocMetadata;
    use crate::plan::StepTarget;
    use std::collections::BTreeSet;

    fn step() -> RemediationStep {
        RemediationStep {
            tool: ToolKind::StructureTagger,
            target: StepTarget::DocumentScope,
            depends_on: BTreeSet::new(),
        }
    }

    #[test]
    fn tagging_shifts_the_document_epoch() {
        let mut doc = Document::from_model(DocMetadata::default(), vec![], vec![]);
        let index = StructureIndex::build(&doc);

        let before = doc.epoch();
        execute(&step(), &mut doc, &index).unwrap();

        assert!(doc.metadata().marked);
        assert!(doc.metadata().has_struct_root);
        assert_eq!(doc.epoch(), before + 1);
    }

    #[test]
    fn unserialisable_document_fails_fatally() {
        // Source bytes that are not a PDF: the round-trip check must abort
        // the plan rather than let later steps run.
        let mut doc = Document::from_model(
            DocMetadata::default(),
            vec![],
            b"this is not a pdf".to_vec(),
        );
        let index = StructureIndex::build(&doc);

        match execute(&step(), &mut doc, &index) {
            Err(ToolFailure::Fatal(StepError::MutationFailed { .. })) => {}
            other => panic!("expected fatal mutation failure, got {other:?}"),
        }
        // The partial mutation is retained, not rolled back.
        assert!(doc.metadata().marked);
    }
}
