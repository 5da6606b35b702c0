// Retry wrapper for scoring providers
//
// - Exponential backoff with jitter
// - Retries 429, 5xx, network errors and timeouts
// - Per-attempt timeout

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{ScoringError, ScoringProvider};
use crate::domain::{config::ScoringConfig, word::WordRecord};

/// Configuration for retrying scoring requests
#[derive(Debug, Clone)]
pub struct RetryConfig {
  /// Maximum number of retry attempts
  pub max_retries: u32,
  /// Initial backoff duration
  pub initial_backoff: Duration,
  /// Maximum backoff duration
  pub max_backoff: Duration,
  /// Backoff multiplier (exponential factor)
  pub backoff_multiplier: f64,
  /// Whether to add jitter to backoff
  pub add_jitter: bool,
  /// Timeout for a single attempt
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(60),
      backoff_multiplier: 2.0,
      add_jitter: true,
      request_timeout: Duration::from_secs(120),
    }
  }
}

impl RetryConfig {
  pub fn from_scoring(config: &ScoringConfig) -> Self {
    Self {
      max_retries: config.max_retries,
      request_timeout: Duration::from_secs(config.request_timeout_secs),
      ..Self::default()
    }
  }

  /// Calculate backoff duration for a given attempt
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let mut backoff = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

    if self.add_jitter {
      // Up to 25% jitter
      let jitter_factor = 1.0 + (rand_f64() * 0.25);
      backoff = Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor);
    }

    backoff.min(self.max_backoff)
  }
}

/// Cheap jitter source; quality does not matter here
fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};

  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .subsec_nanos();

  (nanos as f64 / u32::MAX as f64).fract()
}

/// A scoring provider that retries transient failures of another provider
pub struct ResilientScorer<P: ScoringProvider> {
  inner: P,
  config: RetryConfig,
}

impl<P: ScoringProvider> ResilientScorer<P> {
  pub fn new(provider: P) -> Self {
    Self::with_config(provider, RetryConfig::default())
  }

  pub fn with_config(provider: P, config: RetryConfig) -> Self {
    Self { inner: provider, config }
  }
}

#[async_trait]
impl<P: ScoringProvider> ScoringProvider for ResilientScorer<P> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  async fn score(&self, words: &[&str]) -> Result<Vec<WordRecord>, ScoringError> {
    if words.is_empty() {
      return Ok(Vec::new());
    }

    let max_retries = self.config.max_retries;
    let mut attempt = 0;

    loop {
      if attempt > 0 {
        let backoff = self.config.backoff_for_attempt(attempt - 1);
        debug!(
          attempt,
          max_retries,
          batch_size = words.len(),
          backoff_ms = backoff.as_millis(),
          "Retrying scoring request after backoff"
        );
        sleep(backoff).await;
      }

      let error = match tokio::time::timeout(self.config.request_timeout, self.inner.score(words)).await {
        Ok(Ok(records)) => {
          if attempt > 0 {
            info!(attempt, batch_size = words.len(), "Scoring succeeded after retry");
          }
          return Ok(records);
        }
        Ok(Err(e)) => e,
        Err(_) => ScoringError::Timeout,
      };

      if !error.is_transient() {
        return Err(error);
      }
      if attempt >= max_retries {
        warn!(max_retries, batch_size = words.len(), err = %error, "All scoring retries exhausted");
        return Err(error);
      }

      warn!(
        attempt = attempt + 1,
        max_retries,
        batch_size = words.len(),
        err = %error,
        "Retryable scoring error, will retry"
      );
      attempt += 1;
    }
  }
}
