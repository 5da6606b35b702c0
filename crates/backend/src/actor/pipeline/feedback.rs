//! Resubmission of words that did not make it through scoring
//!
//! A word gets `max_attempts` scoring attempts (0 means unlimited). When it
//! fails again it is sent back to the scoring stage, or to the dead-letter
//! sink once its attempts are spent. A resubmission that cannot be delivered
//! because scoring has shut down is dead-lettered too.

use tracing::{debug, error, warn};

use super::stats::{PipelineStats, bump};
use crate::actor::{
  message::{DeadLetter, ScoreRequest},
  registry::Registry,
};

/// Where a failed word ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resubmission {
  /// Queued for another scoring attempt
  Rescored,
  /// Sent to the dead-letter sink
  DeadLettered,
  /// Nowhere would take it
  Lost,
}

/// Route a word that failed after `spent` scoring attempts
pub fn resubmit(
  registry: &Registry,
  stats: &PipelineStats,
  word: String,
  spent: u32,
  max_attempts: u32,
  reason: &str,
) -> Resubmission {
  if max_attempts > 0 && spent >= max_attempts {
    return dead_letter(registry, stats, word, spent, format!("{} (after {} attempts)", reason, spent));
  }

  debug!(word = %word, attempts = spent, reason, "Resubmitting word");
  match registry.dispatch(ScoreRequest {
    word: word.clone(),
    attempts: spent,
  }) {
    Ok(()) => {
      bump(&stats.resubmitted, 1);
      Resubmission::Rescored
    }
    Err(e) => {
      warn!(word = %word, error = %e, "Cannot resubmit word");
      dead_letter(registry, stats, word, spent, format!("{}; resubmission failed: {}", reason, e))
    }
  }
}

/// Send a word straight to the dead-letter sink
pub fn dead_letter(
  registry: &Registry,
  stats: &PipelineStats,
  word: String,
  attempts: u32,
  reason: String,
) -> Resubmission {
  match registry.dispatch(DeadLetter {
    word: word.clone(),
    attempts,
    reason,
  }) {
    Ok(()) => Resubmission::DeadLettered,
    Err(e) => {
      error!(word = %word, attempts, error = %e, "Word lost: dead-letter sink unavailable");
      bump(&stats.lost, 1);
      Resubmission::Lost
    }
  }
}
