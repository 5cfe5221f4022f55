//! Pipeline options.

use crate::errors::ConfigurationError;
use crate::extraction::SliceBoundary;
use crate::store::KeyOrder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the final document is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeMode {
    /// The compose stage's markdown is written verbatim.
    #[default]
    PassThrough,
    /// The persisted record is rendered through the article template.
    Template,
}

/// Retry policy for transient backend failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: usize,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Calculates the delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            capped + capped * 0.25 * rand::thread_rng().gen::<f64>()
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Tunables of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Documents processed at the same time; 1 means strictly sequential.
    pub max_concurrent_documents: usize,
    /// Time budget of a stage call. A call that runs out of time is not
    /// retried, so this bounds the whole stage.
    pub stage_timeout: Duration,
    /// Research output must be longer than this many characters.
    pub research_min_chars: usize,
    /// How the final document is produced.
    pub compose_mode: ComposeMode,
    /// Where the extracted payload slice ends.
    pub slice_boundary: SliceBoundary,
    /// Accepted top-level markers of a structured payload.
    pub payload_markers: Vec<String>,
    /// Key ordering of persisted records.
    pub key_order: KeyOrder,
    /// Retries for transient backend failures.
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 1,
            stage_timeout: Duration::from_secs(300),
            research_min_chars: 50,
            compose_mode: ComposeMode::default(),
            slice_boundary: SliceBoundary::default(),
            payload_markers: vec!["ARTICLE".to_string(), "ARTIGO".to_string()],
            key_order: KeyOrder::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, documents: usize) -> Self {
        self.max_concurrent_documents = documents;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the research length threshold.
    #[must_use]
    pub fn with_research_min_chars(mut self, chars: usize) -> Self {
        self.research_min_chars = chars;
        self
    }

    /// Sets the compose mode.
    #[must_use]
    pub fn with_compose_mode(mut self, mode: ComposeMode) -> Self {
        self.compose_mode = mode;
        self
    }

    /// Sets the payload slice boundary.
    #[must_use]
    pub fn with_slice_boundary(mut self, boundary: SliceBoundary) -> Self {
        self.slice_boundary = boundary;
        self
    }

    /// Sets the record key ordering.
    #[must_use]
    pub fn with_key_order(mut self, order: KeyOrder) -> Self {
        self.key_order = order;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks the options are usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOption` for a zero concurrency, a zero timeout or an
    /// empty marker list.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrent_documents == 0 {
            return Err(ConfigurationError::invalid_option(
                "max_concurrent_documents",
                "must be at least 1",
            ));
        }
        if self.stage_timeout.is_zero() {
            return Err(ConfigurationError::invalid_option("stage_timeout", "must be positive"));
        }
        if self.payload_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigurationError::invalid_option(
                "payload_markers",
                "at least one marker is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sequential() {
        let options = PipelineOptions::default();
        assert_eq!(options.max_concurrent_documents, 1);
        assert_eq!(options.compose_mode, ComposeMode::PassThrough);
        assert_eq!(options.payload_markers[0], "ARTICLE");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let options = PipelineOptions::new().with_concurrency(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let options = PipelineOptions::new().with_stage_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_jitter_bounds() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for_attempt(0);
        assert!(delay >= Duration::from_secs(2));
        assert!(delay <= Duration::from_secs_f64(2.5));
    }

    #[test]
    fn test_retry_none() {
        assert_eq!(RetryPolicy::none().max_attempts, 1);
        assert_eq!(RetryPolicy::none().with_max_attempts(0).max_attempts, 1);
    }
}
