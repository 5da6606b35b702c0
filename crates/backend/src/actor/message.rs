//! Actor message types for the enrichment pipeline
//!
//! Every mailbox consumes an [`Envelope`]: a payload to hand to the mailbox's
//! handler, a request to flush whatever the handler has buffered, or a stop
//! request. Stop requests carry a priority and, once a drain has been
//! escalated, the priority that originally triggered it.
//!
//! ## Pipeline Message Types
//!
//! Each pipeline stage accepts exactly one payload type, which is also the key
//! the [`Registry`](super::registry::Registry) routes on:
//!
//! ```text
//! WordListRequest → ScoreRequest → Candidate → Accepted
//!                        ↑              │
//!                        └── rejected ──┘        DeadLetter (attempts exhausted)
//! ```

use serde::Serialize;

use crate::domain::word::WordRecord;

// ============================================================================
// Envelope
// ============================================================================

/// How urgently a mailbox should stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPriority {
  /// Deliver everything already queued, then stop
  Drain,
  /// Stop after the in-flight handler call; queued messages are discarded
  Immediate,
}

impl std::fmt::Display for StopPriority {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Drain => write!(f, "drain"),
      Self::Immediate => write!(f, "immediate"),
    }
  }
}

/// The protocol unit every mailbox consumes
#[derive(Debug)]
pub enum Envelope<T> {
  /// A payload for the handler
  Deliver(T),
  /// Flush buffered work now; a pool forwards it to every worker
  Flush,
  /// A stop request
  Stop {
    priority: StopPriority,
    /// Priority that started the shutdown, threaded through escalation so
    /// `on_stop` can tell a graceful stop from an immediate one
    original: Option<StopPriority>,
  },
}

impl<T> Envelope<T> {
  pub fn stop(priority: StopPriority) -> Self {
    Self::Stop {
      priority,
      original: None,
    }
  }
}

// ============================================================================
// Pipeline Messages
// ============================================================================

/// Start streaming the word list into the scoring stage
#[derive(Debug, Clone, Default)]
pub struct WordListRequest {
  /// Skip every word lexicographically less than this marker
  pub resume_after: Option<String>,
  /// Stop after this many words
  pub limit: Option<usize>,
}

/// A word waiting to be scored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRequest {
  pub word: String,
  /// Scoring attempts already spent on this word
  pub attempts: u32,
}

impl ScoreRequest {
  pub fn new(word: impl Into<String>) -> Self {
    Self {
      word: word.into(),
      attempts: 0,
    }
  }
}

/// A record parsed from a scoring response, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub record: WordRecord,
  pub attempts: u32,
}

/// A record that passed validation and is ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted(pub WordRecord);

/// A word that exhausted its scoring attempts or could not be resubmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
  pub word: String,
  pub attempts: u32,
  pub reason: String,
}
