//! `wordrank run` - score the word list and store the results

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use wordrank::{
  actor::{
    StopPriority,
    message::WordListRequest,
    pipeline::{Pipeline, PipelineConfig},
  },
  config::Config,
  db::WordDb,
  scoring::ScoringProvider,
  source::WordSource,
};

use crate::RunArgs;

/// Layer command-line flags over the loaded config
fn apply_overrides(config: &mut Config, args: &RunArgs) {
  if let Some(url) = &args.source_url {
    config.source.url = Some(url.clone());
  }
  if let Some(path) = &args.source_file {
    config.source.path = Some(path.clone());
  }
  if let Some(word) = &args.resume_after {
    config.source.resume_after = Some(word.clone());
  }
  if args.resume {
    config.source.resume = true;
  }
  if let Some(limit) = args.limit {
    config.source.limit = Some(limit);
  }
  if let Some(n) = args.batch_size {
    config.scoring.batch_size = n;
  }
  if let Some(n) = args.workers {
    config.scoring.workers = n;
  }
  if let Some(n) = args.max_attempts {
    config.scoring.max_attempts = n;
  }
  if let Some(model) = &args.model {
    config.scoring.model = model.clone();
  }
  if let Some(path) = &args.store_path {
    config.store.path = Some(path.clone());
  }
  if let Some(n) = args.store_batch_size {
    config.store.batch_size = n;
  }
  if let Some(n) = args.store_workers {
    config.store.workers = n;
  }
}

pub async fn cmd_run(mut config: Config, args: RunArgs) -> Result<()> {
  apply_overrides(&mut config, &args);
  config.validate()?;

  let source = WordSource::from_config(&config.source)?;
  let provider = <dyn ScoringProvider>::from_config(&config.scoring).context("Failed to set up scoring service")?;

  let store_path = config.store.resolved_path();
  let db = WordDb::open(&store_path)
    .await
    .with_context(|| format!("Failed to open store at {:?}", store_path))?;

  // An explicit marker wins over the store-derived one
  let resume_after = match (&config.source.resume_after, config.source.resume) {
    (Some(word), _) => Some(word.clone()),
    (None, true) => {
      let last = db.last_word().await.context("Failed to read last stored word")?;
      info!(last_word = ?last, "Resuming after last stored word");
      if let Some(path) = config.dead_letter.resolved_path() {
        warn!(dead_letters = %path.display(), "Dead-lettered words before the marker are skipped; rerun them from the dead-letter file");
      }
      last
    }
    (None, false) => None,
  };

  let request = WordListRequest {
    resume_after,
    limit: config.source.limit,
  };

  info!(
    source = %source,
    provider = provider.name(),
    model = %config.scoring.model,
    store = %store_path.display(),
    "Starting run"
  );

  let pipeline = Pipeline::start(&PipelineConfig::from_config(&config), source, provider, Arc::new(db))?;
  pipeline.submit(request)?;

  let interrupted = tokio::select! {
    _ = pipeline.settle() => false,
    _ = tokio::signal::ctrl_c() => true,
  };
  let priority = if interrupted {
    warn!("Interrupted, stopping immediately");
    StopPriority::Immediate
  } else {
    StopPriority::Drain
  };
  let report = pipeline.shutdown(priority).await;

  if args.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    println!("{}", report);
  }

  Ok(())
}
