//! `wordrank config` commands

use anyhow::{Context, Result, bail};
use std::path::Path;
use wordrank::config::Config;

/// Load the config file (explicit or user-level) and apply environment
/// overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
  let mut config = Config::load(path).context("Failed to load config")?;
  config.apply_env().context("Invalid environment override")?;
  Ok(config)
}

/// Show the effective configuration
pub fn cmd_config_show(config: &Config, path: Option<&Path>) -> Result<()> {
  let user_config = Config::user_config_path();

  match path {
    Some(path) => println!("Using config: {:?}", path),
    None if user_config.exists() => println!("Using user config: {:?}", user_config),
    None => println!("Using default configuration (no config file found)"),
  }
  println!();

  let mut shown = config.clone();
  if shown.scoring.api_key.is_some() {
    shown.scoring.api_key = Some("********".to_string());
  }
  let toml_str = toml::to_string_pretty(&shown)?;
  println!("{}", toml_str);

  Ok(())
}

/// Write a default configuration file
pub fn cmd_config_init(path: Option<&Path>, force: bool) -> Result<()> {
  let config_path = match path {
    Some(path) => path.to_path_buf(),
    None => Config::user_config_path(),
  };

  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {:?} (use --force to overwrite)",
      config_path
    );
  }

  if let Some(parent) = config_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
  }
  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {:?}", config_path))?;

  println!("Created config: {:?}", config_path);
  println!("Set scoring.api_key (or OPENROUTER_API_KEY) and a word source, then run `wordrank run`.");

  Ok(())
}
