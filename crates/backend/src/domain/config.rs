//! Configuration system for wordrank.
//!
//! Priority, lowest to highest: built-in defaults < TOML file < environment
//! variables < command-line flags. The CLI applies its flags on top of
//! [`Config::load`] and [`Config::apply_env`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dirs;

// ============================================================================
// Source Configuration
// ============================================================================

/// Where the word list comes from
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
  /// URL of a newline-separated word list
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,

  /// Local newline-separated word list (takes precedence over `url`)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,

  /// Skip every word lexicographically less than this marker
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resume_after: Option<String>,

  /// Resume after the last word already in the store
  pub resume: bool,

  /// Stop after this many words
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<usize>,
}

// ============================================================================
// Scoring Configuration
// ============================================================================

/// Scoring service and scoring stage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
  /// Chat model used to score words
  pub model: String,

  /// OpenAI-compatible API base URL
  pub base_url: String,

  /// API key; if not set, reads from OPENROUTER_API_KEY env var
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,

  /// Words per scoring request
  pub batch_size: usize,

  /// Scoring workers (parallel requests)
  pub workers: usize,

  /// Scoring attempts per word before it is dead-lettered (0 = unbounded)
  pub max_attempts: u32,

  /// Sampling temperature sent with each request
  pub temperature: f32,

  /// Per-request timeout in seconds
  pub request_timeout_secs: u64,

  /// Retries for transient HTTP failures (429, 5xx, network, timeout)
  pub max_retries: u32,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      model: "openai/gpt-4o-mini".to_string(),
      base_url: "https://openrouter.ai/api/v1".to_string(),
      api_key: None,
      batch_size: 50,
      workers: num_cpus::get().clamp(1, 8),
      max_attempts: 5,
      temperature: 0.0,
      request_timeout_secs: 120,
      max_retries: 3,
    }
  }
}

// ============================================================================
// Validation Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
  /// Validation workers (1 = a single mailbox, no pool)
  pub workers: usize,
}

impl Default for ValidationConfig {
  fn default() -> Self {
    Self { workers: 1 }
  }
}

// ============================================================================
// Store Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
  /// Database directory (default: <data dir>/lancedb)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,

  /// Records per upsert
  pub batch_size: usize,

  /// Store workers (concurrent upserts)
  pub workers: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path: None,
      batch_size: 100,
      workers: 2,
    }
  }
}

impl StoreConfig {
  pub fn resolved_path(&self) -> PathBuf {
    self.path.clone().unwrap_or_else(dirs::default_store_dir)
  }
}

// ============================================================================
// Dead Letter Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeadLetterConfig {
  /// File dead-lettered words are appended to (default: <data dir>/dead_letters.tsv)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,

  /// Only log dead letters, never write them to disk
  pub log_only: bool,

  /// Dead letters buffered before an append
  pub batch_size: usize,
}

impl Default for DeadLetterConfig {
  fn default() -> Self {
    Self {
      path: None,
      log_only: false,
      batch_size: 100,
    }
  }
}

impl DeadLetterConfig {
  pub fn resolved_path(&self) -> Option<PathBuf> {
    if self.log_only {
      return None;
    }
    Some(self.path.clone().unwrap_or_else(dirs::default_dead_letter_path))
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  pub level: String,

  /// Also write logs to <data dir>/wordrank.log
  pub file: bool,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  pub rotation: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: false,
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
  #[serde(default)]
  pub source: SourceConfig,

  #[serde(default)]
  pub scoring: ScoringConfig,

  #[serde(default)]
  pub validation: ValidationConfig,

  #[serde(default)]
  pub store: StoreConfig,

  #[serde(default)]
  pub dead_letter: DeadLetterConfig,

  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  /// Load configuration from `path`, or from the user config file if it
  /// exists, or fall back to defaults
  ///
  /// An explicit `path` must exist; the user config file is optional.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => Self::load_file(path),
      None => {
        let user_path = Self::user_config_path();
        if user_path.exists() {
          Self::load_file(&user_path)
        } else {
          Ok(Self::default())
        }
      }
    }
  }

  fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get the user-level config path
  pub fn user_config_path() -> PathBuf {
    dirs::default_config_dir().join("config.toml")
  }

  /// Apply `WORDRANK_*` (and `OPENROUTER_API_KEY`) environment variables
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    self.apply_env_from(|key| std::env::var(key).ok())
  }

  /// Apply environment overrides read through `lookup`
  pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("WORDRANK_SOURCE_URL") {
      self.source.url = Some(v);
    }
    if let Some(v) = get("WORDRANK_SOURCE_PATH") {
      self.source.path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("WORDRANK_RESUME_AFTER") {
      self.source.resume_after = Some(v);
    }
    if let Some(v) = get("WORDRANK_LIMIT") {
      self.source.limit = Some(parse_env("WORDRANK_LIMIT", &v)?);
    }

    if let Some(v) = get("OPENROUTER_API_KEY") {
      self.scoring.api_key.get_or_insert(v);
    }
    if let Some(v) = get("WORDRANK_API_KEY") {
      self.scoring.api_key = Some(v);
    }
    if let Some(v) = get("WORDRANK_MODEL") {
      self.scoring.model = v;
    }
    if let Some(v) = get("WORDRANK_BASE_URL") {
      self.scoring.base_url = v;
    }
    if let Some(v) = get("WORDRANK_BATCH_SIZE") {
      self.scoring.batch_size = parse_env("WORDRANK_BATCH_SIZE", &v)?;
    }
    if let Some(v) = get("WORDRANK_WORKERS") {
      self.scoring.workers = parse_env("WORDRANK_WORKERS", &v)?;
    }
    if let Some(v) = get("WORDRANK_MAX_ATTEMPTS") {
      self.scoring.max_attempts = parse_env("WORDRANK_MAX_ATTEMPTS", &v)?;
    }

    if let Some(v) = get("WORDRANK_STORE_PATH") {
      self.store.path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("WORDRANK_STORE_BATCH_SIZE") {
      self.store.batch_size = parse_env("WORDRANK_STORE_BATCH_SIZE", &v)?;
    }
    if let Some(v) = get("WORDRANK_STORE_WORKERS") {
      self.store.workers = parse_env("WORDRANK_STORE_WORKERS", &v)?;
    }

    if let Some(v) = get("WORDRANK_LOG_LEVEL") {
      self.logging.level = v;
    }

    Ok(())
  }

  /// Reject settings the pipeline cannot run with
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.source.url.is_none() && self.source.path.is_none() {
      return Err(ConfigError::Invalid(
        "no word source configured (set source.url or source.path)".to_string(),
      ));
    }
    if self.scoring.batch_size == 0 {
      return Err(ConfigError::Invalid("scoring.batch_size must be at least 1".to_string()));
    }
    if self.store.batch_size == 0 {
      return Err(ConfigError::Invalid("store.batch_size must be at least 1".to_string()));
    }
    if self.dead_letter.batch_size == 0 {
      return Err(ConfigError::Invalid(
        "dead_letter.batch_size must be at least 1".to_string(),
      ));
    }
    Ok(())
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# wordrank configuration
# Place in {user_path}
# Environment variables (WORDRANK_*) and command-line flags override these values.

[source]
# url = "https://raw.githubusercontent.com/dwyl/english-words/master/words_alpha.txt"
# path = "words.txt"
# resume_after = "m"
resume = false
# limit = 1000

[scoring]
model = "{model}"
base_url = "{base_url}"
# api_key = "..."   # or set OPENROUTER_API_KEY
batch_size = {batch_size}
workers = {workers}
max_attempts = {max_attempts}
temperature = {temperature:.1}
request_timeout_secs = {timeout}
max_retries = {max_retries}

[validation]
workers = {validation_workers}

[store]
# path = "/var/lib/wordrank/lancedb"
batch_size = {store_batch_size}
workers = {store_workers}

[dead_letter]
# path = "dead_letters.tsv"
log_only = false
batch_size = {dead_letter_batch_size}

[logging]
level = "{level}"
file = false
rotation = "{rotation}"
"#,
      user_path = Self::user_config_path().display(),
      model = defaults.scoring.model,
      base_url = defaults.scoring.base_url,
      batch_size = defaults.scoring.batch_size,
      workers = defaults.scoring.workers,
      max_attempts = defaults.scoring.max_attempts,
      temperature = defaults.scoring.temperature,
      timeout = defaults.scoring.request_timeout_secs,
      max_retries = defaults.scoring.max_retries,
      validation_workers = defaults.validation.workers,
      store_batch_size = defaults.store.batch_size,
      store_workers = defaults.store.workers,
      dead_letter_batch_size = defaults.dead_letter.batch_size,
      level = defaults.logging.level,
      rotation = defaults.logging.rotation,
    )
  }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
  value.trim().parse().map_err(|_| ConfigError::Env {
    key: key.to_string(),
    value: value.to_string(),
  })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("Invalid value '{value}' for {key}")]
  Env { key: String, value: String },
  #[error("Invalid configuration: {0}")]
  Invalid(String),
}
