use serde::{Deserialize, Serialize};

/// Grammatical tags a stored word may carry
pub const ALLOWED_TYPES: &[&str] = &[
  "noun",
  "verb",
  "adjective",
  "adverb",
  "pronoun",
  "preposition",
  "conjunction",
  "interjection",
  "determiner",
  "article",
  "numeral",
  "abbreviation",
  "prefix",
  "suffix",
];

pub const SCORE_RANGE: std::ops::RangeInclusive<i32> = 0..=10;
pub const SENTIMENT_RANGE: std::ops::RangeInclusive<i32> = -10..=10;

/// A word and the scores assigned to it
///
/// Scores stay `None` until the scoring service fills them in. Only a record
/// that passes [`WordRecord::validate`] is ever written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
  pub word: String,
  pub offensiveness: Option<i32>,
  pub commonness: Option<i32>,
  pub sentiment: Option<i32>,
  /// Lower-cased grammatical tags
  pub types: Vec<String>,
}

impl WordRecord {
  /// An unscored record for `word`
  pub fn new(word: impl Into<String>) -> Self {
    Self {
      word: word.into(),
      offensiveness: None,
      commonness: None,
      sentiment: None,
      types: Vec::new(),
    }
  }

  pub fn with_scores(mut self, offensiveness: i32, commonness: i32, sentiment: i32) -> Self {
    self.offensiveness = Some(offensiveness);
    self.commonness = Some(commonness);
    self.sentiment = Some(sentiment);
    self
  }

  pub fn with_types<I, S>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.types = types.into_iter().map(|t| t.into().to_lowercase()).collect();
    self
  }

  /// Check that every score is present and in range, and that the record has
  /// at least one type, all of them known
  pub fn validate(&self) -> Result<(), Rejection> {
    if self.word.trim().is_empty() {
      return Err(Rejection::EmptyWord);
    }

    check_score("offensiveness", self.offensiveness, &SCORE_RANGE)?;
    check_score("commonness", self.commonness, &SCORE_RANGE)?;
    check_score("sentiment", self.sentiment, &SENTIMENT_RANGE)?;

    if self.types.is_empty() {
      return Err(Rejection::NoTypes);
    }
    if let Some(unknown) = self.types.iter().find(|t| !ALLOWED_TYPES.contains(&t.as_str())) {
      return Err(Rejection::UnknownType(unknown.clone()));
    }

    Ok(())
  }
}

fn check_score(
  field: &'static str,
  value: Option<i32>,
  range: &std::ops::RangeInclusive<i32>,
) -> Result<(), Rejection> {
  match value {
    None => Err(Rejection::MissingScore(field)),
    Some(v) if !range.contains(&v) => Err(Rejection::OutOfRange { field, value: v }),
    Some(_) => Ok(()),
  }
}

/// Why a scored record cannot be stored
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
  #[error("word is empty")]
  EmptyWord,
  #[error("{0} is missing")]
  MissingScore(&'static str),
  #[error("{field} {value} is out of range")]
  OutOfRange { field: &'static str, value: i32 },
  #[error("no grammatical types")]
  NoTypes,
  #[error("unknown grammatical type '{0}'")]
  UnknownType(String),
}
