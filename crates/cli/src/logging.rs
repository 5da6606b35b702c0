//! Logging setup for the CLI

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wordrank::{config::LoggingConfig, dirs::default_data_dir};

const LOG_FILE: &str = "wordrank.log";

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize logging from config
///
/// Logs always go to stderr so stdout stays clean for reports. With
/// `logging.file` set they are also written to a rolling file in the data
/// directory.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
  let level = parse_log_level(&config.level);

  // RUST_LOG overrides the configured level
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let console = fmt::layer().with_target(true).with_writer(std::io::stderr);

  if !config.file {
    tracing_subscriber::registry().with(env_filter).with(console).init();
    return None;
  }

  let log_dir = default_data_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    tracing_subscriber::registry().with(env_filter).with(console).init();
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, LOG_FILE),
    "never" => tracing_appender::rolling::never(&log_dir, LOG_FILE),
    _ => tracing_appender::rolling::daily(&log_dir, LOG_FILE),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  let file = fmt::layer().with_target(true).with_ansi(false).with_writer(file_writer);
  tracing_subscriber::registry()
    .with(env_filter)
    .with(console)
    .with(file)
    .init();

  Some(guard)
}
