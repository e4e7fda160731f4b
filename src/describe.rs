//! Figure description generation: concurrent, rate-limited, retrying.
//!
//! Each figure needing a description becomes one inference call under a
//! bounded pool. Results are keyed by figure identity, never positional
//! order, so concurrent completion order cannot attach a description to the
//! wrong figure.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 class errors from inference APIs are transient and
//! frequent under concurrent load. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) scaled by a 0.5–1.0 jitter factor avoids
//! thundering-herd: with 500 ms base and 3 retries the worst-case wait is
//! under 4 s per figure, and jitter keeps a pool of workers from re-arriving
//! at a recovering endpoint in lockstep. A figure that exhausts its retries
//! is marked failed and the batch continues — one stubborn figure never
//! aborts the run.

use crate::cancel::CancelFlag;
use crate::config::RemediationConfig;
use crate::document::NodeId;
use crate::prompts::{alt_text_system_prompt, figure_user_prompt};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One figure to describe.
#[derive(Debug, Clone)]
pub struct DescribeJob {
    pub id: NodeId,
    pub image_png: Vec<u8>,
    pub caption: Option<String>,
}

/// Result for one figure, keyed by [`NodeId`] in the batch output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeOutcome {
    Described { alt_text: String, retries: u32 },
    /// Retries exhausted; the figure is marked `description_failed` and the
    /// rest of the batch is unaffected.
    Failed { detail: String },
    /// The run was cancelled while this figure was pending or in flight.
    Cancelled,
}

/// The single-call inference boundary.
///
/// [`AltTextGenerator`] owns retry, timeout, pooling and cancellation; the
/// backend does exactly one call attempt. The production backend wraps an
/// [`LLMProvider`]; tests substitute scripted backends.
pub trait DescribeBackend: Send + Sync {
    /// One attempt. `Err` carries a human-readable transient-failure detail.
    fn describe(
        &self,
        image_png: Vec<u8>,
        caption: Option<String>,
        document_type: String,
    ) -> BoxFuture<'_, Result<String, String>>;
}

/// Production backend: one vision chat call per figure.
pub struct LlmDescribeBackend {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmDescribeBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &RemediationConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl DescribeBackend for LlmDescribeBackend {
    fn describe(
        &self,
        image_png: Vec<u8>,
        caption: Option<String>,
        document_type: String,
    ) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async move {
            let b64 = STANDARD.encode(&image_png);
            let image = ImageData::new(b64, "image/png").with_detail("high");

            // The user turn carries the caption context (or nothing); the
            // image carries the actual content.
            let messages = vec![
                ChatMessage::system(alt_text_system_prompt(&document_type)),
                ChatMessage::user_with_images(
                    figure_user_prompt(caption.as_deref()),
                    vec![image],
                ),
            ];

            let options = CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            };

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| format!("{e}"))?;

            debug!(
                "Description call: {} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );

            Ok(response.content)
        })
    }
}

/// Concurrent, retrying description generator for a batch of figures.
pub struct AltTextGenerator {
    backend: Arc<dyn DescribeBackend>,
    document_type: String,
    concurrency: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl AltTextGenerator {
    /// Production constructor over an inference provider.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        config: &RemediationConfig,
        document_type: impl Into<String>,
    ) -> Self {
        Self::with_backend(
            Arc::new(LlmDescribeBackend::new(provider, config)),
            config,
            document_type,
        )
    }

    /// Constructor over an arbitrary backend, used by tests.
    pub fn with_backend(
        backend: Arc<dyn DescribeBackend>,
        config: &RemediationConfig,
        document_type: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            document_type: document_type.into(),
            concurrency: config.concurrency,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Describe a batch of figures under the bounded pool.
    ///
    /// The output maps every input job id to an outcome; completion order is
    /// irrelevant because results are keyed by id.
    pub async fn describe_all(
        &self,
        jobs: Vec<DescribeJob>,
        cancel: &CancelFlag,
    ) -> BTreeMap<NodeId, DescribeOutcome> {
        let total = jobs.len();
        debug!("Describing {total} figure(s), pool size {}", self.concurrency);

        stream::iter(jobs.into_iter().map(|job| {
            let cancel = cancel.clone();
            async move {
                let id = job.id;
                let outcome = self.describe_one(job, &cancel).await;
                (id, outcome)
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await
    }

    /// Drive one figure through timeout, retries and cancellation.
    ///
    /// Never propagates an error upward: the outcome enum is the whole
    /// story, so one bad figure cannot abort the batch.
    async fn describe_one(&self, job: DescribeJob, cancel: &CancelFlag) -> DescribeOutcome {
        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if cancel.is_cancelled() {
                return DescribeOutcome::Cancelled;
            }

            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                // 0.5–1.0 jitter factor
                let factor = 0.5 + rand::random::<f64>() * 0.5;
                let delay = Duration::from_millis((backoff as f64 * factor) as u64);
                warn!(
                    "Figure {}: retry {}/{} after {:?}",
                    job.id, attempt, self.max_retries, delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return DescribeOutcome::Cancelled,
                    _ = sleep(delay) => {}
                }
            }

            let call = self.backend.describe(
                job.image_png.clone(),
                job.caption.clone(),
                self.document_type.clone(),
            );

            tokio::select! {
                _ = cancel.cancelled() => return DescribeOutcome::Cancelled,
                result = timeout(self.api_timeout, call) => match result {
                    Err(_) => {
                        warn!(
                            "Figure {}: call timed out after {:?}",
                            job.id, self.api_timeout
                        );
                        last_err = Some(format!(
                            "timed out after {}s",
                            self.api_timeout.as_secs()
                        ));
                    }
                    Ok(Err(detail)) => {
                        warn!(
                            "Figure {}: attempt {} failed — {}",
                            job.id,
                            attempt + 1,
                            detail
                        );
                        last_err = Some(detail);
                    }
                    Ok(Ok(raw)) => {
                        let alt_text = tidy_alt_text(&raw);
                        for finding in lint_alt_text(&alt_text) {
                            warn!("Figure {}: alt-text lint: {}", job.id, finding);
                        }
                        debug!(
                            "Figure {}: described in {:?} ({} retries)",
                            job.id,
                            start.elapsed(),
                            attempt
                        );
                        return DescribeOutcome::Described {
                            alt_text,
                            retries: attempt,
                        };
                    }
                }
            }
        }

        DescribeOutcome::Failed {
            detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}

/// Strip whitespace and wrapping quotes models like to add.
fn tidy_alt_text(raw: &str) -> String {
    raw.trim().trim_matches(['"', '\'']).trim().to_string()
}

/// Quality lint for generated alt-text, derived from accessibility
/// guidelines. Findings are advisory: the text is still injected, but the
/// shell can surface them for manual review.
pub fn lint_alt_text(alt_text: &str) -> Vec<String> {
    let mut findings = Vec::new();
    let lower = alt_text.to_lowercase();

    if alt_text.len() < 10 {
        findings.push("alt-text may be too short to be descriptive".to_string());
    }
    if alt_text.len() > 500 {
        findings.push("alt-text may be too long; consider being more concise".to_string());
    }

    const BAD_STARTS: [&str; 4] = ["image of", "picture of", "photo of", "figure showing"];
    if BAD_STARTS.iter().any(|p| lower.starts_with(p)) {
        findings.push("alt-text should not start with 'Image of' or similar".to_string());
    }

    const PLACEHOLDERS: [&str; 4] = ["placeholder", "todo", "insert", "add description"];
    if PLACEHOLDERS.iter().any(|p| lower.contains(p)) {
        findings.push("alt-text appears to contain placeholder text".to_string());
    }

    findings
}
