//! Word enrichment pipeline
//!
//! Five stages wired through one [`Registry`], each consuming its own payload
//! type:
//!
//! ```text
//! WordList → Scoring (pool) → Validation → Store (pool)
//!               ↑                 │
//!               └──── rejected ───┘          DeadLetter
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`Pipeline::start`] spawns the stages downstream first and checks that
//!    every route resolves.
//! 2. [`Pipeline::submit`] hands a [`WordListRequest`] to the WordList stage.
//! 3. [`Pipeline::settle`] waits until no delivery is queued or being handled
//!    anywhere, flushing partial scoring batches until none are left.
//!    Resubmissions keep the pipeline busy until they are scored.
//! 4. [`Pipeline::shutdown`] stops the stages upstream first, each stop
//!    awaited before the next, so every flush lands in a live stage.

mod batch;
mod dead_letter;
mod feedback;
mod scorer;
mod stats;
mod validator;
mod word_list;
mod writer;

use std::{path::PathBuf, sync::Arc, time::Instant};

use tracing::{debug, info, trace, warn};

pub use self::{
  batch::Batch,
  dead_letter::DeadLetterStage,
  feedback::{Resubmission, resubmit},
  scorer::ScoringStage,
  stats::{PipelineStats, RunReport},
  validator::ValidationStage,
  word_list::WordListStage,
  writer::{StoreStage, upsert_with_retry},
};
use crate::{
  actor::{
    handle::Mailbox,
    mailbox, pool,
    message::{Accepted, Candidate, DeadLetter, ScoreRequest, StopPriority, WordListRequest},
    registry::{DispatchError, Registry},
  },
  db::{DbError, WordStore},
  domain::config::Config,
  scoring::ScoringProvider,
  source::{SourceError, WordSource},
};

/// Stage sizing and limits for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  pub scoring_batch_size: usize,
  pub scoring_workers: usize,
  /// Scoring attempts per word before it is dead-lettered (0 = unbounded)
  pub max_attempts: u32,
  pub validation_workers: usize,
  pub store_batch_size: usize,
  pub store_workers: usize,
  pub dead_letter_batch_size: usize,
  /// File dead letters are appended to; `None` only logs them
  pub dead_letter_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self::from_config(&Config::default())
  }
}

impl PipelineConfig {
  pub fn from_config(config: &Config) -> Self {
    Self {
      scoring_batch_size: config.scoring.batch_size,
      scoring_workers: config.scoring.workers,
      max_attempts: config.scoring.max_attempts,
      validation_workers: config.validation.workers,
      store_batch_size: config.store.batch_size,
      store_workers: config.store.workers,
      dead_letter_batch_size: config.dead_letter.batch_size,
      dead_letter_path: config.dead_letter.resolved_path(),
    }
  }
}

/// A running pipeline
pub struct Pipeline {
  registry: Registry,
  stats: Arc<PipelineStats>,
  started_at: Instant,
  word_list: Mailbox<WordListRequest>,
  scoring: Mailbox<ScoreRequest>,
  validation: Mailbox<Candidate>,
  store: Mailbox<Accepted>,
  dead_letter: Mailbox<DeadLetter>,
}

impl Pipeline {
  /// Spawn and register every stage
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(
    config: &PipelineConfig,
    source: WordSource,
    provider: Arc<dyn ScoringProvider>,
    store: Arc<dyn WordStore>,
  ) -> Result<Self, PipelineError> {
    let registry = Registry::new();
    let stats = Arc::new(PipelineStats::default());

    let dead_letter = mailbox::spawn_registered(
      &registry,
      "dead-letter",
      DeadLetterStage::new(
        config.dead_letter_path.clone(),
        stats.clone(),
        config.dead_letter_batch_size,
      ),
    )?;

    let store = pool::spawn_registered(&registry, config.store_workers, "store", |_| {
      StoreStage::new(store.clone(), stats.clone(), config.store_batch_size)
    })?;

    let validation = if config.validation_workers <= 1 {
      mailbox::spawn_registered(
        &registry,
        "validation",
        ValidationStage::new(registry.clone(), stats.clone(), config.max_attempts),
      )?
    } else {
      pool::spawn_registered(&registry, config.validation_workers, "validation", |_| {
        ValidationStage::new(registry.clone(), stats.clone(), config.max_attempts)
      })?
    };

    let scoring = pool::spawn_registered(&registry, config.scoring_workers, "scoring", |_| {
      ScoringStage::new(
        provider.clone(),
        registry.clone(),
        stats.clone(),
        config.scoring_batch_size,
        config.max_attempts,
      )
    })?;

    let word_list = mailbox::spawn_registered(
      &registry,
      "word-list",
      WordListStage::new(source, registry.clone(), stats.clone()),
    )?;

    let pipeline = Self {
      registry,
      stats,
      started_at: Instant::now(),
      word_list,
      scoring,
      validation,
      store,
      dead_letter,
    };
    pipeline.verify_routes()?;

    info!(
      scoring_workers = config.scoring_workers.max(1),
      scoring_batch_size = config.scoring_batch_size,
      store_workers = config.store_workers.max(1),
      max_attempts = config.max_attempts,
      "Pipeline started"
    );
    Ok(pipeline)
  }

  fn verify_routes(&self) -> Result<(), DispatchError> {
    self.registry.lookup::<WordListRequest>()?;
    self.registry.lookup::<ScoreRequest>()?;
    self.registry.lookup::<Candidate>()?;
    self.registry.lookup::<Accepted>()?;
    self.registry.lookup::<DeadLetter>()?;
    Ok(())
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn stats(&self) -> &PipelineStats {
    &self.stats
  }

  /// Start streaming a word list
  pub fn submit(&self, request: WordListRequest) -> Result<(), PipelineError> {
    self.registry.dispatch(request)?;
    Ok(())
  }

  /// Wait until every stage is idle and no word waits in a partial scoring
  /// batch
  ///
  /// Partial batches are flushed while scoring is still running, so a word
  /// that fails there is rescored like any other. Each round can resubmit
  /// words into fresh partial batches, so this repeats until a round leaves
  /// nothing buffered.
  pub async fn settle(&self) {
    let mut rounds = 0usize;
    loop {
      self.registry.in_flight().wait_idle().await;

      let buffered = self.stats.scoring_buffered();
      if buffered == 0 {
        break;
      }
      trace!(buffered, round = rounds, "Flushing partial scoring batches");
      if let Err(e) = self.scoring.flush() {
        warn!(error = %e, buffered, "Scoring stopped before its batches were flushed");
        break;
      }
      rounds += 1;
    }
    debug!(flush_rounds = rounds, "Pipeline settled");
  }

  /// Stop every stage upstream first and report the run
  ///
  /// With [`StopPriority::Drain`] each stage handles everything already
  /// queued and flushes its buffers before the next one is stopped.
  pub async fn shutdown(self, priority: StopPriority) -> RunReport {
    info!(%priority, "Stopping pipeline");

    self.word_list.stop(priority).await;
    self.scoring.stop(priority).await;
    self.validation.stop(priority).await;
    self.store.stop(priority).await;
    self.dead_letter.stop(priority).await;

    let report = self
      .stats
      .report(self.registry.in_flight().dropped(), self.started_at.elapsed());
    info!(
      words = report.words_sourced,
      stored = report.stored,
      dead_lettered = report.dead_lettered,
      elapsed_ms = report.elapsed_ms,
      "Pipeline stopped"
    );
    report
  }

  /// Start, stream `request`, settle and drain
  pub async fn run(
    config: &PipelineConfig,
    source: WordSource,
    provider: Arc<dyn ScoringProvider>,
    store: Arc<dyn WordStore>,
    request: WordListRequest,
  ) -> Result<RunReport, PipelineError> {
    let pipeline = Self::start(config, source, provider, store)?;
    if let Err(e) = pipeline.submit(request) {
      pipeline.shutdown(StopPriority::Immediate).await;
      return Err(e);
    }
    pipeline.settle().await;
    Ok(pipeline.shutdown(StopPriority::Drain).await)
  }
}

/// Error from a stage handler, logged by the mailbox that ran it
#[derive(Debug, thiserror::Error)]
pub enum StageError {
  #[error("Word source error: {0}")]
  Source(#[from] SourceError),
  #[error("Dispatch error: {0}")]
  Dispatch(#[from] DispatchError),
  #[error("Store error: {0}")]
  Store(#[from] DbError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("Pipeline wiring failed: {0}")]
  Dispatch(#[from] DispatchError),
}
