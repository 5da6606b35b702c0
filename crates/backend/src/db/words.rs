// Word store operations
//
// Scored words live in two tables:
// - words: one row per word with its three scores (upserted on `word`)
// - word_types: one row per (word, type), replaced wholesale per upsert

use std::{collections::HashMap, sync::Arc};

use arrow_array::{Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use serde::Serialize;
use tracing::debug;

use super::WordStore;
use crate::{
  db::{
    connection::{DbError, Result, WordDb},
    schema::{word_types_schema, words_schema},
  },
  domain::word::WordRecord,
};

/// Summary of what the store holds
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreStats {
  pub words: usize,
  pub word_types: usize,
  pub last_word: Option<String>,
}

impl WordDb {
  /// Insert or replace scored words, together with their types
  ///
  /// Every record must carry all three scores. A word repeated within the
  /// batch is written once, with its last occurrence winning. Returns the
  /// number of words written.
  #[tracing::instrument(level = "trace", skip(self, records), fields(count = records.len()))]
  pub async fn upsert_words(&self, records: &[WordRecord]) -> Result<usize> {
    let records = dedup_by_word(records);
    if records.is_empty() {
      return Ok(0);
    }

    let words_batch = words_to_batch(&records)?;
    let types_batch = types_to_batch(&records)?;

    let words = self.words_table().await?;
    let batches = RecordBatchIterator::new(vec![Ok(words_batch)], words_schema());
    let mut merge_insert = words.merge_insert(&["word"]);
    merge_insert.when_matched_update_all(None).when_not_matched_insert_all();
    merge_insert.execute(Box::new(batches)).await?;

    let word_types = self.word_types_table().await?;
    word_types.delete(&in_filter(&records)).await?;
    if types_batch.num_rows() > 0 {
      let batches = RecordBatchIterator::new(vec![Ok(types_batch)], word_types_schema());
      word_types.add(Box::new(batches)).execute().await?;
    }

    debug!(table = "words", operation = "upsert", count = records.len(), "Upserted words");
    Ok(records.len())
  }

  /// Get a stored word with its types
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_word(&self, word: &str) -> Result<Option<WordRecord>> {
    let filter = format!("word = '{}'", escape_sql(word));

    let results: Vec<RecordBatch> = self
      .words_table()
      .await?
      .query()
      .only_if(filter.clone())
      .execute()
      .await?
      .try_collect()
      .await?;

    let Some(batch) = results.iter().find(|b| b.num_rows() > 0) else {
      return Ok(None);
    };
    let mut record = batch_to_word(batch, 0)?;

    let type_batches: Vec<RecordBatch> = self
      .word_types_table()
      .await?
      .query()
      .only_if(filter)
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &type_batches {
      let types = string_column(batch, "type")?;
      for i in 0..batch.num_rows() {
        record.types.push(types.value(i).to_string());
      }
    }
    record.types.sort();

    Ok(Some(record))
  }

  /// Number of stored words
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_words(&self) -> Result<usize> {
    Ok(self.words_table().await?.count_rows(None).await?)
  }

  /// Lexicographically greatest stored word, the natural resume marker
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn last_word(&self) -> Result<Option<String>> {
    let results: Vec<RecordBatch> = self
      .words_table()
      .await?
      .query()
      .select(Select::columns(&["word"]))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut last: Option<String> = None;
    for batch in &results {
      let words = string_column(batch, "word")?;
      for i in 0..batch.num_rows() {
        let word = words.value(i);
        if last.as_deref().is_none_or(|current| word > current) {
          last = Some(word.to_string());
        }
      }
    }
    Ok(last)
  }

  pub async fn stats(&self) -> Result<StoreStats> {
    Ok(StoreStats {
      words: self.count_words().await?,
      word_types: self.word_types_table().await?.count_rows(None).await?,
      last_word: self.last_word().await?,
    })
  }
}

#[async_trait]
impl WordStore for WordDb {
  async fn upsert_words(&self, records: &[WordRecord]) -> Result<usize> {
    WordDb::upsert_words(self, records).await
  }
}

fn dedup_by_word(records: &[WordRecord]) -> Vec<&WordRecord> {
  let mut index: HashMap<&str, usize> = HashMap::new();
  let mut unique: Vec<&WordRecord> = Vec::with_capacity(records.len());
  for record in records {
    match index.get(record.word.as_str()) {
      Some(&i) => unique[i] = record,
      None => {
        index.insert(&record.word, unique.len());
        unique.push(record);
      }
    }
  }
  unique
}

/// Escape single quotes in SQL strings
fn escape_sql(s: &str) -> String {
  s.replace('\'', "''")
}

fn in_filter(records: &[&WordRecord]) -> String {
  let quoted: Vec<String> = records
    .iter()
    .map(|r| format!("'{}'", escape_sql(&r.word)))
    .collect();
  format!("word IN ({})", quoted.join(", "))
}

fn required_score(record: &WordRecord, field: &str, value: Option<i32>) -> Result<i32> {
  value.ok_or_else(|| DbError::InvalidInput(format!("{} has no {}", record.word, field)))
}

/// Convert records to an Arrow RecordBatch for the words table
fn words_to_batch(records: &[&WordRecord]) -> Result<RecordBatch> {
  let now = Utc::now().timestamp_millis();

  let mut words = Vec::with_capacity(records.len());
  let mut offensiveness = Vec::with_capacity(records.len());
  let mut commonness = Vec::with_capacity(records.len());
  let mut sentiment = Vec::with_capacity(records.len());
  for record in records {
    words.push(record.word.clone());
    offensiveness.push(required_score(record, "offensiveness", record.offensiveness)?);
    commonness.push(required_score(record, "commonness", record.commonness)?);
    sentiment.push(required_score(record, "sentiment", record.sentiment)?);
  }

  let batch = RecordBatch::try_new(
    words_schema(),
    vec![
      Arc::new(StringArray::from(words)),
      Arc::new(Int32Array::from(offensiveness)),
      Arc::new(Int32Array::from(commonness)),
      Arc::new(Int32Array::from(sentiment)),
      Arc::new(Int64Array::from(vec![now; records.len()])),
    ],
  )?;

  Ok(batch)
}

/// Convert records to an Arrow RecordBatch for the word_types table
fn types_to_batch(records: &[&WordRecord]) -> Result<RecordBatch> {
  let mut words = Vec::new();
  let mut types = Vec::new();
  for record in records {
    for t in &record.types {
      words.push(record.word.clone());
      types.push(t.clone());
    }
  }

  let batch = RecordBatch::try_new(
    word_types_schema(),
    vec![Arc::new(StringArray::from(words)), Arc::new(StringArray::from(types))],
  )?;

  Ok(batch)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .ok_or_else(|| DbError::NotFound(format!("{} column", name)))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
    .ok_or_else(|| DbError::NotFound(format!("{} column", name)))
}

/// Convert a words table row to a WordRecord (types are filled separately)
fn batch_to_word(batch: &RecordBatch, row: usize) -> Result<WordRecord> {
  let score = |name: &str| -> Result<Option<i32>> {
    let column = int_column(batch, name)?;
    Ok((!column.is_null(row)).then(|| column.value(row)))
  };

  let mut record = WordRecord::new(string_column(batch, "word")?.value(row));
  record.offensiveness = score("offensiveness")?;
  record.commonness = score("commonness")?;
  record.sentiment = score("sentiment")?;
  Ok(record)
}
