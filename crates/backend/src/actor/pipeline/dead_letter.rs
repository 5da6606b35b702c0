//! Dead-letter sink - words the pipeline gave up on
//!
//! Each dead letter is logged. With a path configured, batches are appended
//! to it as `word<TAB>attempts<TAB>reason` lines.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{
  StageError,
  batch::Batch,
  stats::{PipelineStats, bump},
};
use crate::actor::{
  handle::Mailbox,
  mailbox::Handler,
  message::{DeadLetter, StopPriority},
};

pub struct DeadLetterStage {
  path: Option<PathBuf>,
  stats: Arc<PipelineStats>,
  batch: Batch<DeadLetter>,
}

impl DeadLetterStage {
  pub fn new(path: Option<PathBuf>, stats: Arc<PipelineStats>, batch_size: usize) -> Self {
    Self {
      path,
      stats,
      batch: Batch::new(batch_size),
    }
  }

  async fn flush(&self, letters: Vec<DeadLetter>) -> Result<(), StageError> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    if letters.is_empty() {
      return Ok(());
    }

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .await?;
    file.write_all(format_lines(&letters).as_bytes()).await?;
    file.flush().await?;

    debug!(path = %path.display(), count = letters.len(), "Appended dead letters");
    Ok(())
  }
}

/// Render dead letters as TSV lines; tabs and newlines in fields become spaces
pub fn format_lines(letters: &[DeadLetter]) -> String {
  let clean = |s: &str| s.replace(['\t', '\n', '\r'], " ");
  letters
    .iter()
    .map(|l| format!("{}\t{}\t{}\n", clean(&l.word), l.attempts, clean(&l.reason)))
    .collect()
}

#[async_trait]
impl Handler for DeadLetterStage {
  type Payload = DeadLetter;
  type Error = StageError;

  async fn handle(&mut self, mailbox: &Mailbox<DeadLetter>, letter: DeadLetter) -> Result<(), StageError> {
    bump(&self.stats.dead_lettered, 1);
    warn!(
      mailbox = %mailbox.name(),
      word = %letter.word,
      attempts = letter.attempts,
      reason = %letter.reason,
      "Dead-lettered word"
    );

    if let Some(letters) = self.batch.push(letter) {
      self.flush(letters).await?;
    }
    Ok(())
  }

  async fn on_stop(&mut self, _mailbox: &Mailbox<DeadLetter>, _priority: StopPriority) -> Result<(), StageError> {
    let letters = self.batch.take();
    self.flush(letters).await
  }
}
