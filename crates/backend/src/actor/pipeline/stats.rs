//! Run counters shared by every stage

use std::{
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

use serde::Serialize;

/// Counters updated by the stages while a pipeline runs
#[derive(Debug, Default)]
pub struct PipelineStats {
  pub(crate) words_sourced: AtomicUsize,
  pub(crate) source_failures: AtomicUsize,
  pub(crate) batches_scored: AtomicUsize,
  pub(crate) scoring_failures: AtomicUsize,
  pub(crate) candidates: AtomicUsize,
  pub(crate) accepted: AtomicUsize,
  pub(crate) rejected: AtomicUsize,
  pub(crate) resubmitted: AtomicUsize,
  pub(crate) dead_lettered: AtomicUsize,
  pub(crate) lost: AtomicUsize,
  pub(crate) stored: AtomicUsize,
  pub(crate) store_conflicts: AtomicUsize,
  pub(crate) store_failures: AtomicUsize,
  /// Gauge: requests sitting in partial scoring batches
  pub(crate) scoring_buffered: AtomicUsize,
}

pub(crate) fn bump(counter: &AtomicUsize, n: usize) {
  counter.fetch_add(n, Ordering::Relaxed);
}

pub(crate) fn unbump(counter: &AtomicUsize, n: usize) {
  counter.fetch_sub(n, Ordering::Relaxed);
}

fn read(counter: &AtomicUsize) -> usize {
  counter.load(Ordering::Relaxed)
}

impl PipelineStats {
  /// Requests waiting in a scoring worker's partial batch
  pub fn scoring_buffered(&self) -> usize {
    read(&self.scoring_buffered)
  }

  pub fn report(&self, dropped_on_stop: usize, elapsed: Duration) -> RunReport {
    RunReport {
      words_sourced: read(&self.words_sourced),
      source_failures: read(&self.source_failures),
      batches_scored: read(&self.batches_scored),
      scoring_failures: read(&self.scoring_failures),
      candidates: read(&self.candidates),
      accepted: read(&self.accepted),
      rejected: read(&self.rejected),
      resubmitted: read(&self.resubmitted),
      dead_lettered: read(&self.dead_lettered),
      lost: read(&self.lost),
      stored: read(&self.stored),
      store_conflicts: read(&self.store_conflicts),
      store_failures: read(&self.store_failures),
      dropped_on_stop,
      elapsed_ms: elapsed.as_millis() as u64,
    }
  }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
  /// Words streamed from the source into scoring
  pub words_sourced: usize,
  /// Word list requests that failed to load their source
  pub source_failures: usize,
  /// Scoring calls that returned a response
  pub batches_scored: usize,
  /// Scoring calls that failed after retries
  pub scoring_failures: usize,
  pub candidates: usize,
  pub accepted: usize,
  pub rejected: usize,
  /// Words sent back to scoring for another attempt
  pub resubmitted: usize,
  pub dead_lettered: usize,
  /// Words that could neither be resubmitted nor dead-lettered
  pub lost: usize,
  /// Words written to the store
  pub stored: usize,
  /// Upserts retried because of a concurrent write conflict
  pub store_conflicts: usize,
  /// Records in batches the store failed to write
  pub store_failures: usize,
  /// Deliveries discarded unhandled by an immediate stop
  pub dropped_on_stop: usize,
  pub elapsed_ms: u64,
}

impl std::fmt::Display for RunReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "Words sourced:     {}", self.words_sourced)?;
    writeln!(
      f,
      "Scoring calls:     {} ok, {} failed",
      self.batches_scored, self.scoring_failures
    )?;
    writeln!(
      f,
      "Validation:        {} accepted, {} rejected of {}",
      self.accepted, self.rejected, self.candidates
    )?;
    writeln!(f, "Resubmitted:       {}", self.resubmitted)?;
    writeln!(f, "Dead-lettered:     {}", self.dead_lettered)?;
    writeln!(
      f,
      "Stored:            {} ({} conflicts retried, {} failed)",
      self.stored, self.store_conflicts, self.store_failures
    )?;
    if self.source_failures > 0 {
      writeln!(f, "Source failures:   {}", self.source_failures)?;
    }
    if self.lost > 0 || self.dropped_on_stop > 0 {
      writeln!(f, "Lost:              {} ({} dropped on stop)", self.lost, self.dropped_on_stop)?;
    }
    write!(f, "Elapsed:           {:.1}s", self.elapsed_ms as f64 / 1000.0)
  }
}
