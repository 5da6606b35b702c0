//! Scoring prompt and response parsing
//!
//! The service is asked for one comma-separated line per word:
//!
//! ```text
//! word, offensiveness, commonness, sentiment, type/type
//! ```
//!
//! Parsing is lenient. A numeric field that is missing or unparseable becomes
//! `None` and is caught later by validation; a line with no word is dropped.

use tracing::{debug, trace};

use crate::domain::word::WordRecord;

/// System message sent with every scoring request
pub const INSTRUCTION: &str = "\
You rate English words. For every word in the user's message, reply with exactly one line:
word, offensiveness, commonness, sentiment, types

- offensiveness: integer 0 (harmless) to 10 (extremely offensive)
- commonness: integer 0 (almost never used) to 10 (used constantly)
- sentiment: integer -10 (very negative) to 10 (very positive), 0 is neutral
- types: grammatical types separated by '/', chosen from noun, verb, adjective, adverb, \
pronoun, preposition, conjunction, interjection, determiner, article, numeral, \
abbreviation, prefix, suffix

Reply with the lines only: no header, no numbering, no commentary.";

/// User message for a batch: one word per line
pub fn format_words(words: &[&str]) -> String {
  words.join("\n")
}

/// Parse a scoring reply into records, one per usable line
pub fn parse_response(text: &str) -> Vec<WordRecord> {
  let mut records = Vec::new();

  for line in text.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with("```") {
      continue;
    }
    match parse_line(line) {
      Some(record) => records.push(record),
      None => debug!(line, "Dropping response line without a word"),
    }
  }

  trace!(records = records.len(), "Parsed scoring response");
  records
}

fn parse_line(line: &str) -> Option<WordRecord> {
  let line = strip_list_marker(line);
  let mut fields = line.split(',').map(str::trim);

  let word = fields.next().map(|w| w.trim_matches(|c| c == '"' || c == '\'' || c == '`'))?;
  if word.is_empty() {
    return None;
  }

  let offensiveness = fields.next().and_then(parse_score);
  let commonness = fields.next().and_then(parse_score);
  let sentiment = fields.next().and_then(parse_score);

  // Header echo ("word, offensiveness, ...") carries no scores
  if word.eq_ignore_ascii_case("word") && offensiveness.is_none() && commonness.is_none() {
    return None;
  }

  let types: Vec<String> = fields
    .flat_map(|field| field.split('/'))
    .map(|t| t.trim().to_lowercase())
    .filter(|t| !t.is_empty())
    .collect();

  let mut record = WordRecord::new(word);
  record.offensiveness = offensiveness;
  record.commonness = commonness;
  record.sentiment = sentiment;
  record.types = types;
  Some(record)
}

fn parse_score(field: &str) -> Option<i32> {
  field.trim_start_matches('+').parse().ok()
}

/// Strip "- ", "* " or "12. " prefixes some models add despite instructions
fn strip_list_marker(line: &str) -> &str {
  if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
    return rest.trim_start();
  }

  let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
  if digits > 0
    && let Some(rest) = line[digits..].strip_prefix(". ")
  {
    return rest.trim_start();
  }
  line
}
