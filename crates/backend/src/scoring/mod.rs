//! Scoring service client
//!
//! A [`ScoringProvider`] turns a batch of words into scored [`WordRecord`]s.
//! The service is free to omit words or return garbage for some of them; the
//! pipeline's validation stage decides what is usable.

mod openrouter;
pub mod prompt;
mod resilient;

use std::sync::Arc;

pub use openrouter::OpenRouterScorer;
pub use resilient::{ResilientScorer, RetryConfig};

use crate::domain::{config::ScoringConfig, word::WordRecord};

#[async_trait::async_trait]
pub trait ScoringProvider: Send + Sync {
  fn name(&self) -> &str;

  /// Score a batch of words
  ///
  /// The result holds at most one record per recognized word, in no
  /// particular order. Words the service did not recognize are simply absent.
  async fn score(&self, words: &[&str]) -> Result<Vec<WordRecord>, ScoringError>;
}

impl dyn ScoringProvider {
  /// Build the configured provider, wrapped with retry logic
  pub fn from_config(config: &ScoringConfig) -> Result<Arc<dyn ScoringProvider>, ScoringError> {
    let provider = OpenRouterScorer::new(config)?;
    let resilient = ResilientScorer::with_config(provider, RetryConfig::from_scoring(config));
    Ok(Arc::new(resilient))
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
  #[error("No api key configured for scoring service")]
  NoApiKey,
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Scoring service returned {status}: {body}")]
  Status { status: u16, body: String },
  #[error("Malformed response: {0}")]
  Malformed(String),
  #[error("Network error: {0}")]
  Network(String),
  #[error("Request timed out")]
  Timeout,
}

impl ScoringError {
  /// Whether retrying the same request may succeed
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Network(_) | Self::Timeout => true,
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      _ => false,
    }
  }
}
