//! Validation stage - gatekeeper between scoring and the store
//!
//! A candidate whose scores are complete and in range goes on to the store.
//! Anything else is sent back for another scoring attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
  StageError, feedback,
  stats::{PipelineStats, bump},
};
use crate::actor::{
  handle::Mailbox,
  mailbox::Handler,
  message::{Accepted, Candidate},
  registry::Registry,
};

pub struct ValidationStage {
  registry: Registry,
  stats: Arc<PipelineStats>,
  max_attempts: u32,
}

impl ValidationStage {
  pub fn new(registry: Registry, stats: Arc<PipelineStats>, max_attempts: u32) -> Self {
    Self {
      registry,
      stats,
      max_attempts,
    }
  }
}

#[async_trait]
impl Handler for ValidationStage {
  type Payload = Candidate;
  type Error = StageError;

  async fn handle(&mut self, mailbox: &Mailbox<Candidate>, candidate: Candidate) -> Result<(), StageError> {
    bump(&self.stats.candidates, 1);
    let Candidate { record, attempts } = candidate;

    match record.validate() {
      Ok(()) => {
        bump(&self.stats.accepted, 1);
        let word = record.word.clone();
        if let Err(e) = self.registry.dispatch(Accepted(record)) {
          warn!(mailbox = %mailbox.name(), word = %word, error = %e, "Store unavailable");
          let reason = format!("store unavailable: {}", e);
          feedback::dead_letter(&self.registry, &self.stats, word, attempts, reason);
        }
      }
      Err(rejection) => {
        bump(&self.stats.rejected, 1);
        debug!(mailbox = %mailbox.name(), word = %record.word, attempts, %rejection, "Rejected candidate");
        feedback::resubmit(
          &self.registry,
          &self.stats,
          record.word,
          attempts,
          self.max_attempts,
          &rejection.to_string(),
        );
      }
    }

    Ok(())
  }
}
