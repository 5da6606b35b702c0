use std::path::PathBuf;

/// Get the default base path for wordrank data (store, dead letters, logs)
///
/// Respects the following environment variables (in order of precedence):
/// 1. WORDRANK_DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  // Check explicit override first
  if let Ok(dir) = std::env::var("WORDRANK_DATA_DIR") {
    return PathBuf::from(dir);
  }

  // Check XDG_DATA_HOME
  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("wordrank");
  }

  // Fall back to platform default
  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("wordrank")
}

/// Get the default config directory
///
/// Respects the following environment variables (in order of precedence):
/// 1. WORDRANK_CONFIG_DIR - explicit config directory override
/// 2. XDG_CONFIG_HOME - standard XDG config home directory
/// 3. dirs::config_dir() - platform default
pub fn default_config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("WORDRANK_CONFIG_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return PathBuf::from(xdg_config).join("wordrank");
  }

  dirs::config_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("wordrank")
}

/// Default location of the word store
pub fn default_store_dir() -> PathBuf {
  default_data_dir().join("lancedb")
}

/// Default location of the dead-letter file
pub fn default_dead_letter_path() -> PathBuf {
  default_data_dir().join("dead_letters.tsv")
}
