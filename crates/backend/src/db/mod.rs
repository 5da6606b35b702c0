mod connection;
mod schema;
mod words;

use async_trait::async_trait;

pub use connection::{DbError, Result, WordDb};
pub use words::StoreStats;

use crate::domain::word::WordRecord;

/// Persistent home for validated word records
///
/// Implementations must make `upsert_words` idempotent per word: writing the
/// same batch twice leaves the store as if it was written once.
#[async_trait]
pub trait WordStore: Send + Sync {
  /// Insert or replace `records`, returning the number of words written
  ///
  /// A [`DbError::Conflict`] means a concurrent writer won the race and the
  /// whole batch may simply be written again.
  async fn upsert_words(&self, records: &[WordRecord]) -> Result<usize>;
}
