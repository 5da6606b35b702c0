use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for the words table, one row per scored word
pub fn words_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("word", DataType::Utf8, false),
    Field::new("offensiveness", DataType::Int32, false),
    Field::new("commonness", DataType::Int32, false),
    Field::new("sentiment", DataType::Int32, false),
    Field::new("scored_at", DataType::Int64, false), // Unix timestamp ms
  ]))
}

/// Schema for the word_types table, one row per (word, type) pair
pub fn word_types_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("word", DataType::Utf8, false),
    Field::new("type", DataType::Utf8, false),
  ]))
}
