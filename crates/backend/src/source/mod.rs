//! Word list sources
//!
//! A source yields raw newline-separated text; [`words`] turns that text into
//! a lazy stream of words, honoring a resume marker.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::config::SourceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordSource {
  /// Local newline-separated file
  File(PathBuf),
  /// Newline-separated list fetched over HTTP
  Url(String),
  /// Words supplied directly (tests, small runs)
  Inline(Vec<String>),
}

impl WordSource {
  /// Resolve the configured source; a local path wins over a URL
  pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
    if let Some(path) = &config.path {
      return Ok(Self::File(path.clone()));
    }
    if let Some(url) = &config.url {
      return Ok(Self::Url(url.clone()));
    }
    Err(SourceError::NotConfigured)
  }

  /// Fetch the raw word list text
  pub async fn load(&self) -> Result<String, SourceError> {
    match self {
      Self::File(path) => {
        debug!(path = %path.display(), "Reading word list");
        tokio::fs::read_to_string(path).await.map_err(|source| SourceError::Read {
          path: path.clone(),
          source,
        })
      }
      Self::Url(url) => {
        info!(url = %url, "Downloading word list");
        let response = reqwest::get(url).await?;
        let status = response.status();
        if !status.is_success() {
          return Err(SourceError::Status {
            url: url.clone(),
            status: status.as_u16(),
          });
        }
        let text = response.text().await?;
        debug!(url = %url, bytes = text.len(), "Word list downloaded");
        Ok(text)
      }
      Self::Inline(words) => Ok(words.join("\n")),
    }
  }
}

impl std::fmt::Display for WordSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::File(path) => write!(f, "{}", path.display()),
      Self::Url(url) => write!(f, "{}", url),
      Self::Inline(words) => write!(f, "<{} inline words>", words.len()),
    }
  }
}

/// Trimmed, non-blank lines of `text`, skipping every entry lexicographically
/// less than `resume_after`
pub fn words<'a>(text: &'a str, resume_after: Option<&'a str>) -> impl Iterator<Item = &'a str> + 'a {
  text
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .filter(move |word| resume_after.is_none_or(|marker| *word >= marker))
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
  #[error("No word source configured")]
  NotConfigured,
  #[error("Failed to read word list {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Word list {url} returned {status}")]
  Status { url: String, status: u16 },
}
