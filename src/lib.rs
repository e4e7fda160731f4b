//! # pdfua-remediate
//!
//! Score PDF/UA compliance and remediate document accessibility issues.
//!
//! ## Why this crate?
//!
//! Structural validators (veraPDF and friends) tell you *what* is wrong with
//! a tagged PDF; turning that report into a fixed document is manual,
//! error-prone work — structure tags before heading tags, heading tags
//! before alt-text, one re-validation at the end. This crate owns that
//! pipeline: it normalises the validator's report into a weighted 0–100
//! compliance score, plans a dependency-ordered sequence of remediation
//! steps, executes them against the document's structural tree (generating
//! figure descriptions through a vision model where needed), and re-scores
//! the result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document bytes
//!  │
//!  ├─ 1. Validate  external validator report → Issue taxonomy → pre-score
//!  ├─ 2. Index     structural tree: headings, figures, links, metadata
//!  ├─ 3. Plan      goals → topologically ordered remediation steps
//!  ├─ 4. Execute   metadata → tagging → headings → links / alt-text
//!  │               (alt-text fans out concurrently, keyed by figure)
//!  └─ 5. Re-score  validate again → post-score + per-step outcomes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfua_remediate::{
//!     load_document, Orchestrator, RemediationConfig, RemediationGoal, VeraPdfCli,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = RemediationConfig::default();
//!     let orchestrator = Orchestrator::new(config, Arc::new(VeraPdfCli::locate()?));
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let doc = load_document(&bytes, 50)?;
//!
//!     let output = orchestrator
//!         .run_remediation(doc, &[RemediationGoal::Full], Some("annual report"))
//!         .await?;
//!
//!     println!(
//!         "{} → {:?} ({} steps, state {})",
//!         output.pre_score.summary(),
//!         output.post_score.as_ref().map(|s| s.score),
//!         output.steps.len(),
//!         output.state,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Remediation is not transactional. A fatal step failure aborts the rest of
//! the plan but keeps the mutations already applied — the partial document
//! is usually still an improvement, and the returned step list records
//! exactly what ran. Recoverable failures (a figure whose description could
//! not be generated after retries) are logged into the step outcomes and the
//! run finishes as `PartiallyFailed` with a score.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod cancel;
pub mod config;
pub mod describe;
pub mod document;
pub mod error;
pub mod index;
pub mod orchestrator;
pub mod output;
pub mod plan;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod score;
pub mod tools;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{load_document, persist_document};
pub use cancel::{CancelFlag, CancelHandle};
pub use config::{RemediationConfig, RemediationConfigBuilder};
pub use describe::{AltTextGenerator, DescribeBackend, DescribeJob, DescribeOutcome};
pub use document::{DocMetadata, Document, NodeId, NodeKind, StructureNode};
pub use error::{RemediateError, StepError};
pub use index::StructureIndex;
pub use orchestrator::Orchestrator;
pub use output::{RemediationOutput, RunState, StepOutcome, StepReport};
pub use plan::{plan, RemediationGoal, RemediationPlan, RemediationStep, StepTarget, ToolKind};
pub use progress::{NoopProgress, RemediationProgress};
pub use report::{parse_report, Issue, Severity, SeverityMap, ValidationReport};
pub use score::{score, Grade, GradeScale, ScorePolicy, ScoreResult, SeverityPenalties};
pub use validate::{StructuralValidator, ValidationProfile, VeraPdfCli};
