//! WordList stage - streams the source's words into scoring

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
  StageError,
  stats::{PipelineStats, bump},
};
use crate::{
  actor::{
    handle::Mailbox,
    mailbox::Handler,
    message::{ScoreRequest, WordListRequest},
    registry::Registry,
  },
  source::{self, WordSource},
};

pub struct WordListStage {
  source: WordSource,
  registry: Registry,
  stats: Arc<PipelineStats>,
}

impl WordListStage {
  pub fn new(source: WordSource, registry: Registry, stats: Arc<PipelineStats>) -> Self {
    Self {
      source,
      registry,
      stats,
    }
  }
}

#[async_trait]
impl Handler for WordListStage {
  type Payload = WordListRequest;
  type Error = StageError;

  async fn handle(&mut self, mailbox: &Mailbox<WordListRequest>, request: WordListRequest) -> Result<(), StageError> {
    let text = match self.source.load().await {
      Ok(text) => text,
      Err(e) => {
        bump(&self.stats.source_failures, 1);
        return Err(e.into());
      }
    };

    debug!(
      mailbox = %mailbox.name(),
      source = %self.source,
      resume_after = ?request.resume_after,
      limit = ?request.limit,
      "Streaming word list"
    );

    let limit = request.limit.unwrap_or(usize::MAX);
    let mut sourced = 0usize;
    for word in source::words(&text, request.resume_after.as_deref()).take(limit) {
      self.registry.dispatch(ScoreRequest::new(word))?;
      bump(&self.stats.words_sourced, 1);
      sourced += 1;
    }

    info!(source = %self.source, words = sourced, "Word list streamed");
    Ok(())
  }
}
