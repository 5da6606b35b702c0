//! wordrank CLI - score a word list through an LLM and store the results

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{cmd_config_init, cmd_config_show, cmd_run, cmd_stats, load_config};
use logging::init_logging;
use wordrank::config::Config;

#[derive(Parser)]
#[command(name = "wordrank")]
#[command(about = "Enrich a word list with offensiveness, commonness, sentiment and type scores")]
#[command(after_help = "\
QUICK START:
  wordrank config init                          # Write ~/.config/wordrank/config.toml
  wordrank run --source-file words.txt          # Score a local word list
  wordrank run --resume                         # Continue after the last stored word
  wordrank stats                                # Show what the store holds

ENVIRONMENT:
  OPENROUTER_API_KEY, WORDRANK_API_KEY          # Scoring service key
  WORDRANK_DATA_DIR, WORDRANK_CONFIG_DIR        # Directory overrides
  RUST_LOG                                      # Overrides logging.level")]
struct Cli {
  /// Config file (default: ~/.config/wordrank/config.toml)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Flags for `wordrank run`; each one overrides config and environment
#[derive(Args, Debug, Default)]
pub struct RunArgs {
  /// Download the word list from this URL
  #[arg(long, value_name = "URL")]
  source_url: Option<String>,
  /// Read the word list from this file (wins over --source-url)
  #[arg(long, value_name = "PATH")]
  source_file: Option<PathBuf>,
  /// Skip words lexicographically before this one
  #[arg(long, value_name = "WORD")]
  resume_after: Option<String>,
  /// Resume after the last word already in the store
  ///
  /// The marker is the greatest stored word, so any smaller word that was
  /// dead-lettered, dropped by an interrupted run, or otherwise never stored
  /// is skipped as well. Rerun those from the dead-letter file or with an
  /// explicit --resume-after.
  #[arg(long)]
  resume: bool,
  /// Stop after this many words
  #[arg(long)]
  limit: Option<usize>,
  /// Words per scoring call
  #[arg(long)]
  batch_size: Option<usize>,
  /// Scoring workers
  #[arg(long)]
  workers: Option<usize>,
  /// Scoring attempts per word before it is dead-lettered (0 = unbounded)
  #[arg(long)]
  max_attempts: Option<u32>,
  /// Model identifier passed to the scoring service
  #[arg(long)]
  model: Option<String>,
  /// Store directory
  #[arg(long, value_name = "DIR")]
  store_path: Option<PathBuf>,
  /// Records per store write
  #[arg(long)]
  store_batch_size: Option<usize>,
  /// Store workers
  #[arg(long)]
  store_workers: Option<usize>,
  /// Print the run report as JSON
  #[arg(long)]
  json: bool,
}

/// Subcommands for `wordrank config`
#[derive(Subcommand)]
enum ConfigCommand {
  /// Show the effective configuration (file, environment and defaults merged)
  Show,
  /// Write a default configuration file
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Score the configured word list and store the results
  #[command(after_help = "\
EXAMPLES:
  wordrank run --source-file words.txt --limit 100
  wordrank run --source-url https://example.com/words.txt --workers 4
  wordrank run --resume --json")]
  Run(RunArgs),
  /// Inspect or create the configuration file
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
  /// Show how many words the store holds
  Stats {
    /// Store directory (default: configured store.path)
    #[arg(long, value_name = "DIR")]
    store_path: Option<PathBuf>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // `config init` must work even when the target file is missing or broken
  let config = match &cli.command {
    Commands::Config {
      command: ConfigCommand::Init { .. },
    } => Config::default(),
    _ => load_config(cli.config.as_deref())?,
  };

  let _guard = init_logging(&config.logging);

  match cli.command {
    Commands::Run(args) => cmd_run(config, args).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&config, cli.config.as_deref()),
      ConfigCommand::Init { force } => cmd_config_init(cli.config.as_deref(), force),
    },
    Commands::Stats { store_path, json } => cmd_stats(&config, store_path, json).await,
  }
}
