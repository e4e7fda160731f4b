//! Configuration for the remediation pipeline.
//!
//! Everything the pipeline needs from its environment — severity mapping,
//! score policy, concurrency limits, retry budget, timeouts, provider
//! selection — lives in one explicit [`RemediationConfig`] passed into the
//! orchestrator at construction. There is no process-wide mutable state:
//! two orchestrators with different configs can run side by side.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::describe::DescribeBackend;
use crate::error::RemediateError;
use crate::progress::RemediationProgress;
use crate::report::SeverityMap;
use crate::score::ScorePolicy;
use crate::validate::ValidationProfile;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a remediation pipeline.
///
/// Built via [`RemediationConfig::builder()`] or using
/// [`RemediationConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfua_remediate::RemediationConfig;
///
/// let config = RemediationConfig::builder()
///     .concurrency(2)
///     .max_retries(2)
///     .default_language("de-DE")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RemediationConfig {
    /// Validator-vocabulary → internal severity translation.
    /// Default: the built-in PDF/UA table.
    pub severity_map: SeverityMap,

    /// Score penalties and grade thresholds. Default: critical 10 /
    /// serious 6 / moderate 2 / minor 1, grades at 90/80/70/60.
    pub score_policy: ScorePolicy,

    /// Validation profile requested from the external validator.
    pub profile: ValidationProfile,

    /// Maximum simultaneous in-flight inference calls. Default: 4.
    ///
    /// Inference APIs are network-bound; a small pool cuts wall-clock time
    /// on figure-heavy documents without tripping rate limits. Lower this if
    /// the provider returns 429s.
    pub concurrency: usize,

    /// Maximum retry attempts on a transient inference failure. Default: 3.
    ///
    /// Retries apply only at the inference boundary. Validator and planning
    /// errors are deterministic for a given input, so retrying them cannot
    /// change the outcome and they surface immediately instead.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt and is scaled by a 0.5–1.0 jitter factor
    /// so a pool of workers backing off together does not re-arrive at the
    /// API in lockstep.
    pub retry_backoff_ms: u64,

    /// Per-inference-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// External validator timeout in seconds. Default: 120.
    pub validator_timeout_secs: u64,

    /// Language written by the metadata tool when the document has none.
    /// Default: "en-US".
    pub default_language: String,

    /// Title written when the document has none and no heading candidate is
    /// prominent enough to derive one from. Default: "Untitled Document".
    pub default_title: String,

    /// Minimum width/height in pixels for an image to count as a figure.
    /// Default: 50. Filters out icons, bullets and rules that need no
    /// description.
    pub min_figure_px: u32,

    /// Sampling temperature for description generation. Default: 0.1.
    /// Low temperature keeps the model faithful to what is actually in the
    /// figure.
    pub temperature: f32,

    /// Maximum tokens per generated description. Default: 512.
    pub max_tokens: usize,

    /// Inference model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Inference provider name (e.g. "openai", "anthropic").
    /// If None along with `provider`, the provider factory auto-detects from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    /// Useful in tests or when the caller needs custom middleware.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed description backend. Takes precedence over any
    /// provider setting: the orchestrator then never touches the provider
    /// factory. Lets callers cache, rate-limit or stub the inference
    /// boundary as a whole.
    pub describe_backend: Option<Arc<dyn DescribeBackend>>,

    /// Progress callback for per-step events. Default: none.
    pub progress: Option<Arc<dyn RemediationProgress>>,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            severity_map: SeverityMap::pdfua(),
            score_policy: ScorePolicy::default(),
            profile: ValidationProfile::default(),
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            validator_timeout_secs: 120,
            default_language: "en-US".to_string(),
            default_title: "Untitled Document".to_string(),
            min_figure_px: 50,
            temperature: 0.1,
            max_tokens: 512,
            model: None,
            provider_name: None,
            provider: None,
            describe_backend: None,
            progress: None,
        }
    }
}

impl fmt::Debug for RemediationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationConfig")
            .field("profile", &self.profile)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("validator_timeout_secs", &self.validator_timeout_secs)
            .field("default_language", &self.default_language)
            .field("min_figure_px", &self.min_figure_px)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

impl RemediationConfig {
    /// Create a new builder for `RemediationConfig`.
    pub fn builder() -> RemediationConfigBuilder {
        RemediationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RemediationConfig`].
#[derive(Debug)]
pub struct RemediationConfigBuilder {
    config: RemediationConfig,
}

impl RemediationConfigBuilder {
    pub fn severity_map(mut self, map: SeverityMap) -> Self {
        self.config.severity_map = map;
        self
    }

    pub fn score_policy(mut self, policy: ScorePolicy) -> Self {
        self.config.score_policy = policy;
        self
    }

    pub fn profile(mut self, profile: ValidationProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn validator_timeout_secs(mut self, secs: u64) -> Self {
        self.config.validator_timeout_secs = secs;
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.default_language = lang.into();
        self
    }

    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.config.default_title = title.into();
        self
    }

    pub fn min_figure_px(mut self, px: u32) -> Self {
        self.config.min_figure_px = px;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn describe_backend(mut self, backend: Arc<dyn DescribeBackend>) -> Self {
        self.config.describe_backend = Some(backend);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn RemediationProgress>) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RemediationConfig, RemediateError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(RemediateError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.default_language.is_empty() {
            return Err(RemediateError::InvalidConfig(
                "Default language must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(RemediateError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RemediationConfig::builder().build().unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.default_language, "en-US");
    }

    #[test]
    fn concurrency_is_clamped_to_one() {
        let config = RemediationConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn empty_language_is_rejected() {
        let err = RemediationConfig::builder()
            .default_language("")
            .build()
            .unwrap_err();
        assert!(matches!(err, RemediateError::InvalidConfig(_)));
    }

    #[test]
    fn debug_elides_provider() {
        let config = RemediationConfig::default();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("concurrency"));
        assert!(!dbg.contains("api_key"));
    }
}
