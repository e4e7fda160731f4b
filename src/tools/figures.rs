//! Alt-text injector: generated descriptions for figures.
//!
//! The only tool with network I/O. Figures in the step's target fan out to
//! the [`AltTextGenerator`] under its bounded pool; results come back keyed
//! by node id and are written through the scoped writer. A figure whose
//! description failed after retries is marked `description_failed` and the
//! step reports a recoverable failure — remediation continues for the other
//! figures and for the rest of the plan.

use super::{ExecutionContext, StepResult, ToolFailure};
use crate::describe::{DescribeJob, DescribeOutcome};
use crate::document::{Document, NodeId, NodeKind};
use crate::error::StepError;
use crate::index::StructureIndex;
use crate::plan::{RemediationStep, StepTarget, ToolKind};
use tracing::{info, warn};

pub(super) async fn execute(
    step: &RemediationStep,
    doc: &mut Document,
    index: &StructureIndex,
    ctx: &ExecutionContext<'_>,
) -> Result<StepResult, ToolFailure> {
    let describer = ctx.describer.ok_or_else(|| {
        // The planner only emits this step when a provider is available;
        // reaching here without one is a wiring defect, not a tool failure.
        ToolFailure::Invariant(crate::error::RemediateError::Internal(
            "alt-text step dispatched without a describer".to_string(),
        ))
    })?;

    let targets: Vec<NodeId> = match &step.target {
        StepTarget::Nodes(ids) => ids.clone(),
        StepTarget::DocumentScope => index.figures_missing_alt().map(|f| f.id).collect(),
    };

    let jobs: Vec<DescribeJob> = targets
        .iter()
        .filter_map(|id| doc.node(*id))
        .filter_map(|node| match &node.kind {
            NodeKind::Figure(fig) if fig.alt_text.is_none() => Some(DescribeJob {
                id: node.id,
                image_png: fig.image_png.clone(),
                caption: fig.caption.clone(),
            }),
            _ => None,
        })
        .collect();

    if jobs.is_empty() {
        return Err(ToolFailure::Recoverable(StepError::TargetMissing {
            detail: "no undescribed figures in target".to_string(),
        }));
    }

    let total = jobs.len();
    let outcomes = describer.describe_all(jobs, ctx.cancel).await;

    let mut writer = index.writer(doc, ToolKind::AltTextInjector, step.target.clone())?;
    let mut changed = Vec::new();
    let mut failed = 0usize;
    let mut first_failure: Option<String> = None;

    for (id, outcome) in outcomes {
        match outcome {
            DescribeOutcome::Described { alt_text, retries } => {
                if retries > 0 {
                    info!("Figure {id}: described after {retries} retries");
                }
                changed.push(writer.set_alt_text(id, alt_text)?);
            }
            DescribeOutcome::Failed { detail } => {
                warn!("Figure {id}: description failed permanently — {detail}");
                writer.mark_description_failed(id)?;
                failed += 1;
                first_failure.get_or_insert(detail);
            }
            DescribeOutcome::Cancelled => {
                // Not attempted to exhaustion; leave the figure untouched so
                // a later run picks it up again.
            }
        }
    }

    if failed == total {
        return Err(ToolFailure::Recoverable(StepError::AllDescriptionsFailed {
            figures: total,
            detail: first_failure.unwrap_or_else(|| "unknown error".to_string()),
        }));
    }
    if failed > 0 {
        return Err(ToolFailure::Recoverable(StepError::DescriptionsIncomplete {
            failed,
            total,
        }));
    }

    Ok(StepResult {
        summary: format!("described {} figure(s)", changed.len()),
        nodes_changed: changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelFlag;
    use crate::config::RemediationConfig;
    use crate::describe::{AltTextGenerator, DescribeBackend};
    use crate::document::{DocMetadata, FigureNode, StructureNode};
    use futures::future::BoxFuture;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct CannedBackend {
        fail_caption: Option<String>,
    }

    impl DescribeBackend for CannedBackend {
        fn describe(
            &self,
            _image_png: Vec<u8>,
            caption: Option<String>,
            _document_type: String,
        ) -> BoxFuture<'_, Result<String, String>> {
            Box::pin(async move {
                match (&self.fail_caption, &caption) {
                    (Some(fail), Some(cap)) if fail == cap => Err("502".into()),
                    _ => Ok(format!("Chart of {}", caption.unwrap_or_default())),
                }
            })
        }
    }

    fn figure(id: u32, caption: &str) -> StructureNode {
        StructureNode {
            id: NodeId(id),
            parent: None,
            page: 0,
            kind: NodeKind::Figure(FigureNode {
                width: 200,
                height: 200,
                image_png: vec![0u8; 4],
                caption: Some(caption.into()),
                alt_text: None,
                description_failed: false,
                tagged: false,
            }),
        }
    }

    fn config() -> RemediationConfig {
        RemediationConfig::builder()
            .concurrency(2)
            .max_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    async fn run(
        doc: &mut Document,
        targets: Vec<NodeId>,
        backend: CannedBackend,
    ) -> Result<StepResult, ToolFailure> {
        let config = config();
        let generator =
            AltTextGenerator::with_backend(Arc::new(backend), &config, "paper");
        let cancel = CancelFlag::never();
        let ctx = ExecutionContext {
            config: &config,
            describer: Some(&generator),
            cancel: &cancel,
        };
        let index = StructureIndex::build(doc);
        let step = RemediationStep {
            tool: ToolKind::AltTextInjector,
            target: StepTarget::Nodes(targets),
            depends_on: BTreeSet::new(),
        };
        execute(&step, doc, &index, &ctx).await
    }

    #[tokio::test]
    async fn descriptions_attach_to_their_own_figures() {
        let mut doc = Document::from_model(
            DocMetadata::default(),
            vec![figure(0, "rainfall"), figure(1, "temperature")],
            vec![],
        );
        let result = run(
            &mut doc,
            vec![NodeId(0), NodeId(1)],
            CannedBackend { fail_caption: None },
        )
        .await
        .unwrap();
        assert_eq!(result.nodes_changed.len(), 2);

        for (id, expected) in [(0u32, "rainfall"), (1, "temperature")] {
            let node = doc.node(NodeId(id)).unwrap();
            let NodeKind::Figure(fig) = &node.kind else {
                panic!("not a figure")
            };
            let alt = fig.alt_text.as_deref().unwrap();
            assert!(alt.contains(expected), "figure {id} got '{alt}'");
        }
    }

    #[tokio::test]
    async fn one_failed_figure_is_recoverable_and_marked() {
        let mut doc = Document::from_model(
            DocMetadata::default(),
            vec![figure(0, "good"), figure(1, "bad"), figure(2, "good 2")],
            vec![],
        );
        let result = run(
            &mut doc,
            vec![NodeId(0), NodeId(1), NodeId(2)],
            CannedBackend {
                fail_caption: Some("bad".into()),
            },
        )
        .await;

        match result {
            Err(ToolFailure::Recoverable(StepError::DescriptionsIncomplete {
                failed,
                total,
            })) => {
                assert_eq!((failed, total), (1, 3));
            }
            other => panic!("expected recoverable incomplete, got {other:?}"),
        }

        let NodeKind::Figure(fig) = &doc.node(NodeId(1)).unwrap().kind else {
            panic!("not a figure")
        };
        assert!(fig.description_failed);
        assert!(fig.alt_text.is_none());

        // The two healthy figures still got their descriptions.
        let rebuilt = StructureIndex::build(&doc);
        assert_eq!(rebuilt.figures().iter().filter(|f| f.has_alt).count(), 2);
    }

    #[tokio::test]
    async fn all_failures_stay_recoverable() {
        let mut doc =
            Document::from_model(DocMetadata::default(), vec![figure(0, "bad")], vec![]);
        let result = run(
            &mut doc,
            vec![NodeId(0)],
            CannedBackend {
                fail_caption: Some("bad".into()),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(ToolFailure::Recoverable(
                StepError::AllDescriptionsFailed { figures: 1, .. }
            ))
        ));
    }
}
