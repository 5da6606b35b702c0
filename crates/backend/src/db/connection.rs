use std::path::{Path, PathBuf};

use lancedb::{Connection, connect};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::schema::{word_types_schema, words_schema};

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(lancedb::Error),
  #[error("Concurrent write conflict: {0}")]
  Conflict(String),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Invalid input: {0}")]
  InvalidInput(String),
}

impl DbError {
  /// Whether the same write may succeed if simply attempted again
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::Conflict(_))
  }
}

impl From<lancedb::Error> for DbError {
  fn from(e: lancedb::Error) -> Self {
    // Lance reports commit conflicts between concurrent writers only in the
    // message text, whichever variant carries it
    let message = e.to_string();
    if message.to_lowercase().contains("conflict") {
      Self::Conflict(message)
    } else {
      Self::Lance(e)
    }
  }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Connection to the word store
#[derive(Clone)]
pub struct WordDb {
  pub path: PathBuf,
  pub connection: Connection,
}

impl std::fmt::Debug for WordDb {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WordDb").field("path", &self.path).finish()
  }
}

impl WordDb {
  /// Open or create the word store at `db_path`
  pub async fn open(db_path: &Path) -> Result<Self> {
    tokio::fs::create_dir_all(db_path).await?;

    info!(path = %db_path.display(), "Opening word store");
    let connection = match connect(db_path.to_string_lossy().as_ref()).execute().await {
      Ok(conn) => {
        debug!(path = %db_path.display(), "Database connection established");
        conn
      }
      Err(e) => {
        error!(path = %db_path.display(), err = %e, "Failed to connect to database");
        return Err(e.into());
      }
    };

    let db = Self {
      path: db_path.to_path_buf(),
      connection,
    };

    debug!("Initializing database schema");
    db.ensure_tables().await?;

    Ok(db)
  }

  /// Ensure all required tables exist
  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;
    debug!(existing_tables = table_names.len(), "Checking required tables");

    if !table_names.contains(&"words".to_string()) {
      debug!("Creating words table");
      self
        .connection
        .create_empty_table("words", words_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"word_types".to_string()) {
      debug!("Creating word_types table");
      self
        .connection
        .create_empty_table("word_types", word_types_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  /// Get the words table
  pub async fn words_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("words").execute().await?)
  }

  /// Get the word_types table
  pub async fn word_types_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("word_types").execute().await?)
  }
}
