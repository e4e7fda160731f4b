//! End-to-end pipeline tests over the public API.
//!
//! The two external collaborators — the structural validator and the
//! inference backend — are scripted, so every scenario here is deterministic
//! and runs offline: reports are queued per validation pass, and figure
//! descriptions succeed or fail by caption.

use futures::future::BoxFuture;
use pdfua_remediate::{
    document::{FigureNode, HeadingNode, LinkNode},
    CancelHandle, DescribeBackend, DocMetadata, Document, Grade, NodeId, NodeKind, Orchestrator,
    RemediateError, RemediationConfig, RemediationGoal, RemediationProgress, RunState,
    StepOutcome, StepError, StructureNode, StructuralValidator, ToolKind, ValidationProfile,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Scripted collaborators ───────────────────────────────────────────────

/// Returns queued reports in order; a clean report once the queue is empty.
struct ScriptedValidator {
    reports: Mutex<VecDeque<Value>>,
}

impl ScriptedValidator {
    fn new(reports: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(reports.into()),
        })
    }
}

impl StructuralValidator for ScriptedValidator {
    fn validate(
        &self,
        _bytes: &[u8],
        _profile: ValidationProfile,
    ) -> Result<Value, RemediateError> {
        Ok(self
            .reports
            .lock()
            .expect("report queue poisoned")
            .pop_front()
            .unwrap_or_else(clean_report))
    }
}

/// Describes every figure except ones whose caption matches `fail_caption`.
struct CannedBackend {
    fail_caption: Option<String>,
}

impl CannedBackend {
    fn ok() -> Arc<Self> {
        Arc::new(Self { fail_caption: None })
    }

    fn failing_on(caption: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_caption: Some(caption.to_string()),
        })
    }
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
                (Some(fail), Some(cap)) if fail == cap => Err("503 unavailable".to_string()),
                _ => Ok(format!(
                    "A diagram illustrating {}.",
                    caption.unwrap_or_else(|| "the page content".into())
                )),
            }
        })
    }
}

// ── Report builders ──────────────────────────────────────────────────────

fn failure(clause: &str, test: u32, description: &str) -> Value {
    json!({
        "clause": clause,
        "testNumber": test,
        "description": description,
        "severity": "ERROR",
    })
}

fn report_with(failures: Vec<Value>) -> Value {
    json!({
        "summary": {
            "passedRules": 90,
            "failedRules": failures.len(),
            "passedChecks": 500,
            "failedChecks": failures.len(),
        },
        "failures": failures,
    })
}

fn clean_report() -> Value {
    report_with(vec![])
}

fn untagged_report() -> Value {
    report_with(vec![
        failure("7.1", 11, "StructTreeRoot entry is missing"),
        failure("7.18.6", 1, "Figure element without Alt attribute"),
        failure("7.2", 34, "Natural language is not declared"),
        failure("7.4", 1, "Heading structure is not tagged"),
    ])
}

// ── Document builders ────────────────────────────────────────────────────

fn heading_node(id: u32, text: &str) -> StructureNode {
    StructureNode {
        id: NodeId(id),
        parent: None,
        page: 0,
        kind: NodeKind::Heading(HeadingNode {
            level: 1,
            text: text.into(),
            font_size: 21.0,
            bold: true,
            tagged: false,
        }),
    }
}

fn figure_node(id: u32, caption: &str) -> StructureNode {
    StructureNode {
        id: NodeId(id),
        parent: None,
        page: 0,
        kind: NodeKind::Figure(FigureNode {
            width: 320,
            height: 240,
            image_png: vec![0u8; 16],
            caption: Some(caption.into()),
            alt_text: None,
            description_failed: false,
            tagged: false,
        }),
    }
}

fn link_node(id: u32) -> StructureNode {
    StructureNode {
        id: NodeId(id),
        parent: None,
        page: 0,
        kind: NodeKind::Link(LinkNode {
            uri: Some("https://example.org/method".into()),
            link_text: None,
            tagged: false,
        }),
    }
}

/// Untagged document: one heading candidate, `figures` figures, one link.
fn untagged_document(figures: u32) -> Document {
    let mut nodes = vec![heading_node(0, "Quarterly Emissions Report")];
    for i in 0..figures {
        nodes.push(figure_node(1 + i, &format!("figure {i}")));
    }
    let link_id = 1 + figures;
    nodes.push(link_node(link_id));
    Document::from_model(
        DocMetadata {
            page_count: 1,
            ..DocMetadata::default()
        },
        nodes,
        vec![],
    )
}

/// Fully tagged document whose only gap is `figures` alt-less figures.
fn tagged_document_missing_alt(figures: u32) -> Document {
    let mut nodes = Vec::new();
    for i in 0..figures {
        nodes.push(figure_node(i, &format!("figure {i}")));
    }
    Document::from_model(
        DocMetadata {
            title: Some("Quarterly Emissions Report".into()),
            language: Some("en-US".into()),
            marked: true,
            has_struct_root: true,
            display_doc_title: true,
            page_count: 1,
        },
        nodes,
        vec![],
    )
}

fn config_with_backend(backend: Arc<dyn DescribeBackend>) -> RemediationConfig {
    RemediationConfig::builder()
        .concurrency(2)
        .max_retries(1)
        .retry_backoff_ms(1)
        .describe_backend(backend)
        .build()
        .expect("valid config")
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_only_scores_the_documented_scenario() {
    // serious=6 ×3, moderate=2 ×1 → 100 - 18 - 2 = 80, grade B
    let validator = ScriptedValidator::new(vec![report_with(vec![
        failure("7.2", 34, "Page content language missing"),
        failure("7.2", 34, "Page content language missing"),
        failure("7.2", 34, "Page content language missing"),
        failure("7.4", 1, "Heading not tagged"),
    ])]);
    let orchestrator = Orchestrator::new(RemediationConfig::default(), validator);

    let score = orchestrator
        .run_validation_only(&untagged_document(1))
        .await
        .expect("validation should succeed");

    assert_eq!(score.score, 80);
    assert_eq!(score.grade, Grade::B);
    assert!(!score.compliant);
}

#[tokio::test]
async fn full_remediation_runs_every_step_and_rescores() {
    let validator = ScriptedValidator::new(vec![untagged_report(), clean_report()]);
    let orchestrator = Orchestrator::new(config_with_backend(CannedBackend::ok()), validator);

    let output = orchestrator
        .run_remediation(
            untagged_document(2),
            &[RemediationGoal::Full],
            Some("sustainability report"),
        )
        .await
        .expect("run should succeed");

    assert_eq!(output.state, RunState::Done);
    assert_eq!(output.pre_score.score, 72, "10+10+6+2 in penalties");
    assert!(!output.pre_score.compliant);

    let post = output.post_score.as_ref().expect("post score present");
    assert_eq!(post.score, 100);
    assert!(post.compliant);

    // All five tools ran, dependencies before dependents.
    let order: Vec<ToolKind> = output.steps.iter().map(|s| s.tool).collect();
    assert_eq!(order.len(), 5);
    let pos = |tool: ToolKind| order.iter().position(|t| *t == tool).unwrap();
    assert!(pos(ToolKind::MetadataWriter) < pos(ToolKind::StructureTagger));
    assert!(pos(ToolKind::StructureTagger) < pos(ToolKind::HeadingTagger));
    assert!(pos(ToolKind::HeadingTagger) < pos(ToolKind::LinkTextFixer));
    assert!(pos(ToolKind::HeadingTagger) < pos(ToolKind::AltTextInjector));
    assert!(output.steps.iter().all(|s| !s.is_failure()));

    // The document itself carries the remediation.
    let doc = &output.document;
    assert_eq!(
        doc.metadata().title.as_deref(),
        Some("Quarterly Emissions Report"),
        "title derived from the most prominent heading"
    );
    assert!(doc.metadata().marked);
    for node in doc.nodes() {
        match &node.kind {
            NodeKind::Heading(h) => assert!(h.tagged),
            NodeKind::Figure(f) => {
                let alt = f.alt_text.as_deref().expect("figure described");
                assert!(alt.contains("figure"), "got: {alt}");
            }
            NodeKind::Link(l) => {
                assert_eq!(l.link_text.as_deref(), Some("Link to method on example.org"));
            }
        }
    }
}

#[tokio::test]
async fn one_failing_figure_out_of_five_yields_partially_failed() {
    let validator = ScriptedValidator::new(vec![
        report_with(vec![failure("7.18.6", 1, "Figure without Alt")]),
        report_with(vec![failure("7.18.6", 1, "Figure without Alt")]),
    ]);
    let orchestrator = Orchestrator::new(
        config_with_backend(CannedBackend::failing_on("figure 2")),
        validator,
    );

    let output = orchestrator
        .run_remediation(
            tagged_document_missing_alt(5),
            &[RemediationGoal::AltTextOnly],
            None,
        )
        .await
        .expect("run should complete");

    // A score was produced, but the run is partial, not aborted.
    assert_eq!(output.state, RunState::PartiallyFailed);
    assert!(output.post_score.is_some());

    assert_eq!(output.steps.len(), 1);
    match &output.steps[0].outcome {
        StepOutcome::Failed { error, fatal } => {
            assert!(!fatal);
            assert!(matches!(
                error,
                StepError::DescriptionsIncomplete { failed: 1, total: 5 }
            ));
        }
        other => panic!("expected a recoverable failure, got {other:?}"),
    }

    // The other four figures each received their own description.
    let mut described = 0;
    let mut failed = 0;
    for node in output.document.nodes() {
        if let NodeKind::Figure(f) = &node.kind {
            if f.description_failed {
                failed += 1;
                assert!(f.alt_text.is_none());
            } else {
                described += 1;
                let alt = f.alt_text.as_deref().unwrap();
                let caption = f.caption.as_deref().unwrap();
                assert!(alt.contains(caption), "figure got '{alt}' for '{caption}'");
            }
        }
    }
    assert_eq!((described, failed), (4, 1));
}

#[tokio::test]
async fn fatal_failure_on_step_two_aborts_the_plan() {
    // Garbage source bytes: the structure tagger's serialisation check
    // fails fatally on step 2 of the 5-step plan.
    let mut doc = untagged_document(1);
    doc = Document::from_model(
        doc.metadata().clone(),
        doc.nodes().to_vec(),
        b"not a pdf".to_vec(),
    );

    let validator = ScriptedValidator::new(vec![untagged_report()]);
    let orchestrator = Orchestrator::new(config_with_backend(CannedBackend::ok()), validator);

    let output = orchestrator
        .run_remediation(doc, &[RemediationGoal::Full], None)
        .await
        .expect("aborted runs still return an output");

    assert_eq!(output.state, RunState::Aborted);
    assert!(output.post_score.is_none(), "aborted runs skip re-validation");

    // Exactly two entries: step 1 applied, step 2 failed fatally.
    assert_eq!(output.steps.len(), 2);
    assert_eq!(output.steps[0].tool, ToolKind::MetadataWriter);
    assert!(!output.steps[0].is_failure());
    assert_eq!(output.steps[1].tool, ToolKind::StructureTagger);
    assert!(matches!(
        output.steps[1].outcome,
        StepOutcome::Failed { fatal: true, .. }
    ));

    // Step 1's mutation is retained; steps 3–5 were never attempted.
    assert!(output.document.metadata().title.is_some());
    for node in output.document.nodes() {
        if let NodeKind::Figure(f) = &node.kind {
            assert!(f.alt_text.is_none(), "alt-text step must not have run");
        }
    }

    // Strict callers get the typed fatal error.
    let err = output.into_result().unwrap_err();
    assert!(matches!(
        err,
        RemediateError::FatalStep {
            tool: ToolKind::StructureTagger,
            ..
        }
    ));
}

#[tokio::test]
async fn remediated_documents_replan_to_zero_steps() {
    let validator =
        ScriptedValidator::new(vec![untagged_report(), clean_report(), clean_report()]);
    let orchestrator = Orchestrator::new(config_with_backend(CannedBackend::ok()), validator);

    let first = orchestrator
        .run_remediation(untagged_document(1), &[RemediationGoal::Full], None)
        .await
        .unwrap();
    assert_eq!(first.state, RunState::Done);
    assert!(!first.steps.is_empty());

    // Re-running full remediation finds nothing to do: no spurious
    // re-tagging, state is a clean Done.
    let second = orchestrator
        .run_remediation(first.document, &[RemediationGoal::Full], None)
        .await
        .unwrap();
    assert_eq!(second.state, RunState::Done);
    assert!(second.steps.is_empty(), "got {:?}", second.steps);
}

#[tokio::test]
async fn cancellation_halts_dispatch_and_retains_mutations() {
    /// Cancels the run as its target step starts.
    struct CancelAtStep {
        handle: CancelHandle,
        at: usize,
    }

    impl RemediationProgress for CancelAtStep {
        fn on_step_start(&self, _tool: ToolKind, step: usize, _total: usize) {
            if step == self.at {
                self.handle.cancel();
            }
        }
    }

    let (handle, flag) = CancelHandle::new();
    let config = RemediationConfig::builder()
        .concurrency(2)
        .max_retries(1)
        .retry_backoff_ms(1)
        .describe_backend(CannedBackend::ok())
        .progress(Arc::new(CancelAtStep { handle, at: 2 }))
        .build()
        .unwrap();

    let validator = ScriptedValidator::new(vec![untagged_report()]);
    let orchestrator = Orchestrator::new(config, validator);

    let output = orchestrator
        .run_remediation_with_cancel(
            untagged_document(1),
            &[RemediationGoal::Full],
            None,
            flag,
        )
        .await
        .expect("cancelled runs still return an output");

    // Step 2 was already in flight when the flag fired, so it completes;
    // nothing after it is dispatched.
    assert_eq!(output.state, RunState::Aborted);
    assert_eq!(output.steps.len(), 2);
    assert!(output.steps.iter().all(|s| !s.is_failure()));
    assert!(output.post_score.is_none());

    // Mutations from the completed steps are retained.
    assert!(output.document.metadata().marked);

    let err = output.into_result().unwrap_err();
    assert!(matches!(
        err,
        RemediateError::Cancelled { completed_steps: 2 }
    ));
}
