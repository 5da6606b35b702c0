//! Test helpers for actor and pipeline tests.
//!
//! - [`Recorder`]: a handler that records what it handled and how it stopped
//! - [`MockScorer`]: a scripted scoring service that records every batch
//! - [`MockStore`]: an in-memory word store that can conflict or fail on demand

use std::{
  collections::{BTreeMap, HashMap},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::{
  actor::{handle::Mailbox, mailbox::Handler, message::StopPriority, pipeline::PipelineConfig},
  db::{DbError, WordStore},
  domain::word::WordRecord,
  scoring::{ScoringError, ScoringProvider},
};

// ============================================================================
// Recording handler
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
  Handled(T),
  Flushed,
  Stopped(StopPriority),
}

/// Shared, ordered log of a recorder's events
pub struct Events<T>(Arc<Mutex<Vec<Event<T>>>>);

impl<T> Clone for Events<T> {
  fn clone(&self) -> Self {
    Self(self.0.clone())
  }
}

impl<T: Clone> Events<T> {
  fn new() -> Self {
    Self(Arc::new(Mutex::new(Vec::new())))
  }

  fn push(&self, event: Event<T>) {
    self.0.lock().unwrap().push(event);
  }

  pub fn snapshot(&self) -> Vec<Event<T>> {
    self.0.lock().unwrap().clone()
  }

  pub fn handled(&self) -> Vec<T> {
    self
      .snapshot()
      .into_iter()
      .filter_map(|e| match e {
        Event::Handled(payload) => Some(payload),
        _ => None,
      })
      .collect()
  }

  pub fn flushes(&self) -> usize {
    self.snapshot().iter().filter(|e| matches!(e, Event::Flushed)).count()
  }

  pub fn stops(&self) -> Vec<StopPriority> {
    self
      .snapshot()
      .into_iter()
      .filter_map(|e| match e {
        Event::Stopped(priority) => Some(priority),
        _ => None,
      })
      .collect()
  }
}

/// Handler that records every payload it handles and its stop priority
pub struct Recorder<T> {
  events: Events<T>,
  delay: Option<Duration>,
  gate: Option<Arc<Semaphore>>,
  check: Option<fn(&T) -> Result<(), String>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
  pub fn new() -> (Self, Events<T>) {
    let events = Events::new();
    (
      Self {
        events: events.clone(),
        delay: None,
        gate: None,
        check: None,
      },
      events,
    )
  }

  /// Sleep for `delay` before recording each payload
  pub fn with_delay(delay: Duration) -> (Self, Events<T>) {
    let (mut recorder, events) = Self::new();
    recorder.delay = Some(delay);
    (recorder, events)
  }

  /// Wait for a permit from `gate` before handling each payload
  pub fn gated(gate: Arc<Semaphore>) -> (Self, Events<T>) {
    let (mut recorder, events) = Self::new();
    recorder.gate = Some(gate);
    (recorder, events)
  }

  /// Run `check` before recording; an `Err` fails the delivery and a panic
  /// inside `check` panics the handler
  pub fn checked(check: fn(&T) -> Result<(), String>) -> (Self, Events<T>) {
    let (mut recorder, events) = Self::new();
    recorder.check = Some(check);
    (recorder, events)
  }
}

#[async_trait]
impl<T: Clone + Send + 'static> Handler for Recorder<T> {
  type Payload = T;
  type Error = String;

  async fn handle(&mut self, _mailbox: &Mailbox<T>, payload: T) -> Result<(), String> {
    if let Some(gate) = &self.gate {
      gate.acquire().await.map_err(|e| e.to_string())?.forget();
    }
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if let Some(check) = self.check {
      check(&payload)?;
    }
    self.events.push(Event::Handled(payload));
    Ok(())
  }

  async fn on_flush(&mut self, _mailbox: &Mailbox<T>) -> Result<(), String> {
    self.events.push(Event::Flushed);
    Ok(())
  }

  async fn on_stop(&mut self, _mailbox: &Mailbox<T>, priority: StopPriority) -> Result<(), String> {
    self.events.push(Event::Stopped(priority));
    Ok(())
  }
}

// ============================================================================
// Mock scoring service
// ============================================================================

type ScoreFn = dyn Fn(&str, usize) -> Option<WordRecord> + Send + Sync;

/// Scoring service driven by a closure `(word, nth time scored) -> record`
///
/// Returning `None` omits the word from the response.
pub struct MockScorer {
  respond: Box<ScoreFn>,
  fail_calls: AtomicUsize,
  batches: Mutex<Vec<Vec<String>>>,
  seen: Mutex<HashMap<String, usize>>,
}

impl MockScorer {
  pub fn new(respond: impl Fn(&str, usize) -> Option<WordRecord> + Send + Sync + 'static) -> Self {
    Self {
      respond: Box::new(respond),
      fail_calls: AtomicUsize::new(0),
      batches: Mutex::new(Vec::new()),
      seen: Mutex::new(HashMap::new()),
    }
  }

  /// Scores every word as a valid, neutral noun
  pub fn valid() -> Self {
    Self::new(|word, _| Some(valid_record(word)))
  }

  /// Fail the first `calls` calls with a service error
  pub fn failing_first(self, calls: usize) -> Self {
    self.fail_calls.store(calls, Ordering::SeqCst);
    self
  }

  /// Every batch the service was called with, in call order
  pub fn batches(&self) -> Vec<Vec<String>> {
    self.batches.lock().unwrap().clone()
  }

  /// How many times `word` was sent to the service
  pub fn calls_for(&self, word: &str) -> usize {
    self.batches().iter().flatten().filter(|w| *w == word).count()
  }
}

pub fn valid_record(word: &str) -> WordRecord {
  WordRecord::new(word).with_scores(0, 5, 0).with_types(["noun"])
}

#[async_trait]
impl ScoringProvider for MockScorer {
  fn name(&self) -> &str {
    "mock"
  }

  async fn score(&self, words: &[&str]) -> Result<Vec<WordRecord>, ScoringError> {
    self
      .batches
      .lock()
      .unwrap()
      .push(words.iter().map(|w| w.to_string()).collect());

    let failing = self
      .fail_calls
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(ScoringError::Status {
        status: 400,
        body: "scripted failure".to_string(),
      });
    }

    let mut seen = self.seen.lock().unwrap();
    Ok(
      words
        .iter()
        .filter_map(|word| {
          let nth = seen.entry(word.to_string()).or_insert(0);
          *nth += 1;
          (self.respond)(word, *nth)
        })
        .collect(),
    )
  }
}

// ============================================================================
// Mock store
// ============================================================================

/// In-memory word store recording every upsert call
#[derive(Default)]
pub struct MockStore {
  records: Mutex<BTreeMap<String, WordRecord>>,
  batches: Mutex<Vec<Vec<WordRecord>>>,
  conflicts: AtomicUsize,
  fail: bool,
}

impl MockStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Report a write conflict on the first `times` calls
  pub fn conflicting(times: usize) -> Self {
    let store = Self::default();
    store.conflicts.store(times, Ordering::SeqCst);
    store
  }

  /// Fail every call with a non-retryable error
  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::default()
    }
  }

  /// Stored words in lexicographic order
  pub fn words(&self) -> Vec<String> {
    self.records.lock().unwrap().keys().cloned().collect()
  }

  pub fn get(&self, word: &str) -> Option<WordRecord> {
    self.records.lock().unwrap().get(word).cloned()
  }

  /// Every batch passed to `upsert_words`, conflicting attempts included
  pub fn batches(&self) -> Vec<Vec<WordRecord>> {
    self.batches.lock().unwrap().clone()
  }
}

#[async_trait]
impl WordStore for MockStore {
  async fn upsert_words(&self, records: &[WordRecord]) -> Result<usize, DbError> {
    self.batches.lock().unwrap().push(records.to_vec());

    if self.fail {
      return Err(DbError::InvalidInput("scripted failure".to_string()));
    }
    let conflicting = self
      .conflicts
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if conflicting {
      return Err(DbError::Conflict("scripted conflict".to_string()));
    }

    let mut stored = self.records.lock().unwrap();
    for record in records {
      stored.insert(record.word.clone(), record.clone());
    }
    Ok(records.len())
  }
}

// ============================================================================
// Pipeline config
// ============================================================================

/// Small, deterministic pipeline: one worker per stage, nothing on disk
pub fn test_config(scoring_batch_size: usize) -> PipelineConfig {
  PipelineConfig {
    scoring_batch_size,
    scoring_workers: 1,
    max_attempts: 5,
    validation_workers: 1,
    store_batch_size: 100,
    store_workers: 1,
    dead_letter_batch_size: 100,
    dead_letter_path: None,
  }
}

pub fn inline(words: &[&str]) -> crate::source::WordSource {
  crate::source::WordSource::Inline(words.iter().map(|w| w.to_string()).collect())
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let deadline = tokio::time::Instant::now() + timeout;
  while tokio::time::Instant::now() < deadline {
    if condition() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  condition()
}
