//! `wordrank stats` - summarize the word store

use std::path::PathBuf;

use anyhow::{Context, Result};
use wordrank::{config::Config, db::WordDb};

pub async fn cmd_stats(config: &Config, store_path: Option<PathBuf>, json: bool) -> Result<()> {
  let path = store_path.unwrap_or_else(|| config.store.resolved_path());

  if !path.exists() {
    println!("No store at {:?}", path);
    println!("Run `wordrank run` to create it.");
    return Ok(());
  }

  let db = WordDb::open(&path)
    .await
    .with_context(|| format!("Failed to open store at {:?}", path))?;
  let stats = db.stats().await.context("Failed to read store statistics")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&stats)?);
    return Ok(());
  }

  println!("wordrank Store");
  println!("==============\n");
  println!("Path:           {}", path.display());
  println!("Words:          {}", stats.words);
  println!("Word types:     {}", stats.word_types);
  println!("Last word:      {}", stats.last_word.as_deref().unwrap_or("-"));

  Ok(())
}
