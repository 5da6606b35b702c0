//! Store stage - accumulates accepted records and batch writes them

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, trace};

use super::{
  StageError,
  batch::Batch,
  stats::{PipelineStats, bump},
};
use crate::{
  actor::{
    handle::Mailbox,
    mailbox::Handler,
    message::{Accepted, StopPriority},
  },
  db::{DbError, WordStore},
  domain::word::WordRecord,
};

pub struct StoreStage {
  store: Arc<dyn WordStore>,
  stats: Arc<PipelineStats>,
  batch: Batch<WordRecord>,
}

impl StoreStage {
  pub fn new(store: Arc<dyn WordStore>, stats: Arc<PipelineStats>, batch_size: usize) -> Self {
    Self {
      store,
      stats,
      batch: Batch::new(batch_size),
    }
  }

  async fn flush(&self, mailbox: &str, records: Vec<WordRecord>) -> Result<usize, StageError> {
    if records.is_empty() {
      return Ok(0);
    }

    match upsert_with_retry(self.store.as_ref(), &records, &self.stats).await {
      Ok(written) => {
        bump(&self.stats.stored, written);
        trace!(mailbox, written, "Flushed batch to store");
        Ok(written)
      }
      Err(e) => {
        bump(&self.stats.store_failures, records.len());
        error!(mailbox, batch_size = records.len(), error = %e, "Failed to write batch to store");
        Err(e.into())
      }
    }
  }
}

/// Upsert `records`, retrying the whole batch for as long as it conflicts
/// with a concurrent writer
pub async fn upsert_with_retry(
  store: &dyn WordStore,
  records: &[WordRecord],
  stats: &PipelineStats,
) -> Result<usize, DbError> {
  loop {
    match store.upsert_words(records).await {
      Ok(written) => return Ok(written),
      Err(e) if e.is_conflict() => {
        bump(&stats.store_conflicts, 1);
        debug!(batch_size = records.len(), error = %e, "Write conflict, retrying batch");
        tokio::task::yield_now().await;
      }
      Err(e) => return Err(e),
    }
  }
}

#[async_trait]
impl Handler for StoreStage {
  type Payload = Accepted;
  type Error = StageError;

  async fn handle(&mut self, mailbox: &Mailbox<Accepted>, accepted: Accepted) -> Result<(), StageError> {
    if let Some(records) = self.batch.push(accepted.0) {
      self.flush(mailbox.name(), records).await?;
    }
    Ok(())
  }

  async fn on_stop(&mut self, mailbox: &Mailbox<Accepted>, priority: StopPriority) -> Result<(), StageError> {
    let records = self.batch.take();
    debug!(mailbox = %mailbox.name(), %priority, remaining = records.len(), "Flushing store batch");
    self.flush(mailbox.name(), records).await?;
    Ok(())
  }
}
