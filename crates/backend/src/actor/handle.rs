//! Mailbox handles for communicating with actors
//!
//! Handles are cheap to clone and provide a way to send messages to a mailbox
//! and to stop it. They never own the actor: the actor task owns its handler
//! and inbox receiver, and every clone of the handle shares one inbox.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{
  message::{Envelope, StopPriority},
  registry::InFlight,
};

// ============================================================================
// Mailbox Handle
// ============================================================================

/// Handle to a running mailbox processor (or pool coordinator)
pub struct Mailbox<T> {
  inner: Arc<MailboxInner<T>>,
}

struct MailboxInner<T> {
  name: String,
  tx: mpsc::UnboundedSender<Envelope<T>>,
  /// Deliveries queued or being handled
  pending: AtomicUsize,
  /// Deliveries discarded because they were still queued at stop
  dropped: AtomicUsize,
  /// Woken whenever `pending` drops to zero (shared by the workers of a pool)
  idle: Arc<Notify>,
  /// Fired once the actor has run `on_stop` and terminated
  stopped: CancellationToken,
  in_flight: InFlight,
}

impl<T> Clone for Mailbox<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<T> std::fmt::Debug for Mailbox<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mailbox")
      .field("name", &self.inner.name)
      .field("pending", &self.pending())
      .field("stopped", &self.is_stopped())
      .finish()
  }
}

impl<T> Mailbox<T> {
  pub(crate) fn new(
    name: String,
    tx: mpsc::UnboundedSender<Envelope<T>>,
    idle: Arc<Notify>,
    in_flight: InFlight,
  ) -> Self {
    Self {
      inner: Arc::new(MailboxInner {
        name,
        tx,
        pending: AtomicUsize::new(0),
        dropped: AtomicUsize::new(0),
        idle,
        stopped: CancellationToken::new(),
        in_flight,
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  /// Deliveries queued or currently being handled
  pub fn pending(&self) -> usize {
    self.inner.pending.load(Ordering::Acquire)
  }

  /// Deliveries that were discarded at stop without being handled
  pub fn dropped(&self) -> usize {
    self.inner.dropped.load(Ordering::Acquire)
  }

  pub fn is_stopped(&self) -> bool {
    self.inner.stopped.is_cancelled()
  }

  /// Enqueue a payload. Returns immediately; order is preserved relative to
  /// other posts to this mailbox only.
  pub fn post(&self, payload: T) -> Result<(), SendError> {
    self.enqueue(Envelope::Deliver(payload))
  }

  /// Ask the handler to flush whatever it has buffered
  ///
  /// The request counts as pending until the flush has run, so in-flight
  /// waits also cover the work the flush hands downstream.
  pub fn flush(&self) -> Result<(), SendError> {
    self.enqueue(Envelope::Flush)
  }

  fn enqueue(&self, envelope: Envelope<T>) -> Result<(), SendError> {
    self.inner.pending.fetch_add(1, Ordering::AcqRel);
    self.inner.in_flight.enter();

    if self.inner.tx.send(envelope).is_err() {
      self.settle();
      return Err(SendError::ActorGone(self.inner.name.clone()));
    }
    Ok(())
  }

  /// Ask the mailbox to stop and wait until it has fully stopped
  ///
  /// With [`StopPriority::Drain`] every payload posted before this call is
  /// handled first. Calling `stop` on a mailbox that already stopped returns
  /// immediately.
  pub async fn stop(&self, priority: StopPriority) {
    if self.is_stopped() {
      return;
    }
    self.request_stop(priority);
    self.stopped().await;
  }

  /// Enqueue a stop request without waiting for it to complete
  pub fn request_stop(&self, priority: StopPriority) {
    self.send_stop(priority, None);
  }

  /// Wait until the mailbox has run its stop callback and terminated
  pub async fn stopped(&self) {
    self.inner.stopped.cancelled().await;
  }

  pub(crate) fn send_stop(&self, priority: StopPriority, original: Option<StopPriority>) {
    trace!(mailbox = %self.inner.name, %priority, ?original, "Stop requested");
    // A closed inbox means the actor is already stopping; `stopped` still fires
    let _ = self.inner.tx.send(Envelope::Stop { priority, original });
  }

  /// Mark one delivery as finished (handled, dropped, or never enqueued)
  pub(crate) fn settle(&self) {
    if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.inner.idle.notify_waiters();
    }
    self.inner.in_flight.exit();
  }

  pub(crate) fn record_dropped(&self, count: usize) {
    if count > 0 {
      self.inner.dropped.fetch_add(count, Ordering::AcqRel);
      self.inner.in_flight.record_dropped(count);
    }
  }

  /// Token fired when the actor terminates; the actor holds a drop guard on it
  pub(crate) fn stopped_token(&self) -> CancellationToken {
    self.inner.stopped.clone()
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Mailbox '{0}' has shut down")]
  ActorGone(String),
}
