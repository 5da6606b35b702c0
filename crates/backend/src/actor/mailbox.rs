//! Mailbox processor - a single-task, strictly sequential actor
//!
//! A mailbox owns one unbounded FIFO inbox and one [`Handler`]. Payloads are
//! handled one at a time in post order; a failing or panicking handler call is
//! logged and the loop moves on.
//!
//! ## Stopping
//!
//! - `Drain`: keep handling until the inbox is observed empty (including work
//!   that arrives while draining), then stop. An `Immediate` request seen while
//!   draining cuts the drain short.
//! - `Immediate`: stop after the current handler call. Anything still queued
//!   is discarded and counted.
//!
//! Either way the handler's `on_stop` runs exactly once, with the priority
//! that started the shutdown, before [`Mailbox::stopped`] fires.

use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, trace, warn};

use super::{
  handle::Mailbox,
  message::{Envelope, StopPriority},
  registry::{DispatchError, Registry},
};

/// Behavior of a mailbox: what to do with each payload and at shutdown
#[async_trait]
pub trait Handler: Send + 'static {
  type Payload: Send + 'static;
  type Error: std::fmt::Display + Send;

  async fn handle(&mut self, mailbox: &Mailbox<Self::Payload>, payload: Self::Payload) -> Result<(), Self::Error>;

  /// Flush buffered work, requested through [`Mailbox::flush`]
  async fn on_flush(&mut self, _mailbox: &Mailbox<Self::Payload>) -> Result<(), Self::Error> {
    Ok(())
  }

  async fn on_stop(&mut self, _mailbox: &Mailbox<Self::Payload>, _priority: StopPriority) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// Spawn an unregistered mailbox running `handler`
pub fn spawn<H: Handler>(registry: &Registry, name: impl Into<String>, handler: H) -> Mailbox<H::Payload> {
  spawn_with_idle(registry, name.into(), handler, Arc::new(Notify::new()))
}

/// Spawn a mailbox and route its payload type to it
pub fn spawn_registered<H: Handler>(
  registry: &Registry,
  name: impl Into<String>,
  handler: H,
) -> Result<Mailbox<H::Payload>, DispatchError> {
  let mailbox = spawn(registry, name, handler);
  if let Err(e) = registry.register(&mailbox) {
    mailbox.request_stop(StopPriority::Immediate);
    return Err(e);
  }
  Ok(mailbox)
}

/// Spawn a mailbox that signals `idle` whenever its pending count drops to
/// zero. Pool workers share one notifier with their coordinator.
pub(crate) fn spawn_with_idle<H: Handler>(
  registry: &Registry,
  name: String,
  handler: H,
  idle: Arc<Notify>,
) -> Mailbox<H::Payload> {
  let (tx, rx) = mpsc::unbounded_channel();
  let mailbox = Mailbox::new(name, tx, idle, registry.in_flight().clone());
  tokio::spawn(run(handler, rx, mailbox.clone()));
  mailbox
}

/// Main actor loop
async fn run<H: Handler>(
  mut handler: H,
  mut rx: mpsc::UnboundedReceiver<Envelope<H::Payload>>,
  mailbox: Mailbox<H::Payload>,
) {
  let _stopped = mailbox.stopped_token().drop_guard();
  debug!(mailbox = %mailbox.name(), "Mailbox started");

  let priority = loop {
    match rx.recv().await {
      Some(Envelope::Deliver(payload)) => deliver(&mut handler, &mailbox, payload).await,
      Some(Envelope::Flush) => flush(&mut handler, &mailbox).await,
      Some(Envelope::Stop {
        priority: StopPriority::Drain,
        original,
      }) => {
        drain(&mut handler, &mut rx, &mailbox).await;
        break original.unwrap_or(StopPriority::Drain);
      }
      Some(Envelope::Stop {
        priority: StopPriority::Immediate,
        original,
      }) => break original.unwrap_or(StopPriority::Immediate),
      None => break StopPriority::Immediate,
    }
  };

  rx.close();

  match AssertUnwindSafe(handler.on_stop(&mailbox, priority)).catch_unwind().await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => error!(mailbox = %mailbox.name(), error = %e, "Stop callback failed"),
    Err(_) => error!(mailbox = %mailbox.name(), "Stop callback panicked"),
  }

  let dropped = discard(&mut rx, &mailbox);
  if dropped > 0 {
    warn!(mailbox = %mailbox.name(), dropped, "Discarded undelivered messages on stop");
  }

  debug!(mailbox = %mailbox.name(), %priority, "Mailbox stopped");
}

/// Hand one payload to the handler, containing failures at this boundary
async fn deliver<H: Handler>(handler: &mut H, mailbox: &Mailbox<H::Payload>, payload: H::Payload) {
  match AssertUnwindSafe(handler.handle(mailbox, payload)).catch_unwind().await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => error!(mailbox = %mailbox.name(), error = %e, "Handler failed"),
    Err(_) => error!(mailbox = %mailbox.name(), "Handler panicked"),
  }
  mailbox.settle();
}

async fn flush<H: Handler>(handler: &mut H, mailbox: &Mailbox<H::Payload>) {
  match AssertUnwindSafe(handler.on_flush(mailbox)).catch_unwind().await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => error!(mailbox = %mailbox.name(), error = %e, "Flush failed"),
    Err(_) => error!(mailbox = %mailbox.name(), "Flush panicked"),
  }
  mailbox.settle();
}

/// Handle everything queued until the inbox is observed empty or an
/// immediate stop is requested
async fn drain<H: Handler>(
  handler: &mut H,
  rx: &mut mpsc::UnboundedReceiver<Envelope<H::Payload>>,
  mailbox: &Mailbox<H::Payload>,
) {
  let mut drained = 0usize;
  while let Ok(envelope) = rx.try_recv() {
    match envelope {
      Envelope::Deliver(payload) => {
        deliver(handler, mailbox, payload).await;
        drained += 1;
      }
      Envelope::Flush => flush(handler, mailbox).await,
      Envelope::Stop {
        priority: StopPriority::Immediate,
        ..
      } => {
        debug!(mailbox = %mailbox.name(), drained, "Immediate stop requested while draining");
        return;
      }
      Envelope::Stop {
        priority: StopPriority::Drain,
        ..
      } => {
        debug!(mailbox = %mailbox.name(), "Ignoring repeated drain request");
      }
    }
  }
  trace!(mailbox = %mailbox.name(), drained, "Inbox drained");
}

/// Drop whatever is still queued after the stop decision, returning the
/// number of undelivered payloads
pub(crate) fn discard<T>(rx: &mut mpsc::UnboundedReceiver<Envelope<T>>, mailbox: &Mailbox<T>) -> usize {
  let mut dropped = 0;
  while let Ok(envelope) = rx.try_recv() {
    match envelope {
      Envelope::Deliver(_) => {
        mailbox.settle();
        dropped += 1;
      }
      Envelope::Flush => mailbox.settle(),
      Envelope::Stop { .. } => {}
    }
  }
  mailbox.record_dropped(dropped);
  dropped
}
