//! Scoring stage - batches words and scores them through the scoring service
//!
//! Each worker owns its own buffer. A full buffer is scored at once; a partial
//! one is scored on a flush request, or when the worker stops. Every requested word ends up in
//! exactly one place: a `Candidate` for validation when the service returned
//! it, otherwise back in scoring (or the dead-letter sink) via feedback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::{
  StageError,
  batch::Batch,
  feedback,
  stats::{PipelineStats, bump, unbump},
};
use crate::{
  actor::{
    handle::Mailbox,
    mailbox::Handler,
    message::{Candidate, ScoreRequest, StopPriority},
    registry::Registry,
  },
  scoring::ScoringProvider,
};

pub struct ScoringStage {
  provider: Arc<dyn ScoringProvider>,
  registry: Registry,
  stats: Arc<PipelineStats>,
  batch: Batch<ScoreRequest>,
  max_attempts: u32,
}

impl ScoringStage {
  pub fn new(
    provider: Arc<dyn ScoringProvider>,
    registry: Registry,
    stats: Arc<PipelineStats>,
    batch_size: usize,
    max_attempts: u32,
  ) -> Self {
    Self {
      provider,
      registry,
      stats,
      batch: Batch::new(batch_size),
      max_attempts,
    }
  }

  async fn score_batch(&self, mailbox: &str, requests: Vec<ScoreRequest>) {
    if requests.is_empty() {
      return;
    }

    let words: Vec<&str> = requests.iter().map(|r| r.word.as_str()).collect();
    trace!(mailbox, batch_size = words.len(), "Scoring batch");

    let records = match self.provider.score(&words).await {
      Ok(records) => {
        bump(&self.stats.batches_scored, 1);
        records
      }
      Err(e) => {
        bump(&self.stats.scoring_failures, 1);
        warn!(mailbox, batch_size = words.len(), error = %e, "Scoring call failed, resubmitting batch");
        let reason = format!("scoring failed: {}", e);
        for request in requests {
          self.resubmit(request, &reason);
        }
        return;
      }
    };

    let mut pending = requests;
    for mut record in records {
      // Match case-insensitively; each request is answered at most once
      let needle = record.word.trim().to_lowercase();
      let Some(index) = pending.iter().position(|r| r.word.to_lowercase() == needle) else {
        debug!(mailbox, word = %record.word, "Ignoring record for a word not in the batch");
        continue;
      };
      let request = pending.swap_remove(index);

      record.word = request.word.clone();
      let attempts = request.attempts + 1;
      if let Err(e) = self.registry.dispatch(Candidate { record, attempts }) {
        warn!(mailbox, error = %e, "Validation unavailable");
        let reason = format!("validation unavailable: {}", e);
        feedback::dead_letter(&self.registry, &self.stats, request.word, attempts, reason);
      }
    }

    for request in pending {
      self.resubmit(request, "not returned by scoring service");
    }
  }

  fn take_batch(&mut self) -> Vec<ScoreRequest> {
    let requests = self.batch.take();
    unbump(&self.stats.scoring_buffered, requests.len());
    requests
  }

  fn resubmit(&self, request: ScoreRequest, reason: &str) {
    feedback::resubmit(
      &self.registry,
      &self.stats,
      request.word,
      request.attempts + 1,
      self.max_attempts,
      reason,
    );
  }
}

#[async_trait]
impl Handler for ScoringStage {
  type Payload = ScoreRequest;
  type Error = StageError;

  async fn handle(&mut self, mailbox: &Mailbox<ScoreRequest>, request: ScoreRequest) -> Result<(), StageError> {
    bump(&self.stats.scoring_buffered, 1);
    if let Some(requests) = self.batch.push(request) {
      unbump(&self.stats.scoring_buffered, requests.len());
      self.score_batch(mailbox.name(), requests).await;
    }
    Ok(())
  }

  async fn on_flush(&mut self, mailbox: &Mailbox<ScoreRequest>) -> Result<(), StageError> {
    let requests = self.take_batch();
    if !requests.is_empty() {
      debug!(mailbox = %mailbox.name(), batch_size = requests.len(), "Flushing partial scoring batch");
    }
    self.score_batch(mailbox.name(), requests).await;
    Ok(())
  }

  async fn on_stop(&mut self, mailbox: &Mailbox<ScoreRequest>, priority: StopPriority) -> Result<(), StageError> {
    let requests = self.take_batch();
    debug!(mailbox = %mailbox.name(), %priority, remaining = requests.len(), "Flushing scoring batch");
    self.score_batch(mailbox.name(), requests).await;
    Ok(())
  }
}
