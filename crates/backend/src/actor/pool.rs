//! Round-robin worker pool
//!
//! A pool is a coordinator mailbox in front of a fixed set of worker
//! mailboxes. Callers only ever see the coordinator's [`Mailbox`], so a pool is
//! interchangeable with a single processor. Each worker gets its own handler
//! from the factory, which keeps per-worker state (such as batch buffers)
//! unshared.
//!
//! ```text
//!              ┌→ worker 0   (payload 0, K, 2K, ...)
//! coordinator ─┼→ worker 1   (payload 1, K+1, ...)
//!              └→ worker K-1
//! ```
//!
//! A flush request is forwarded to every worker rather than routed.
//!
//! The coordinator drains by routing everything in its own inbox and then
//! waiting until every worker reports zero pending deliveries. Only then are
//! the workers stopped, one after another in index order. An immediate stop
//! requested during the drain ends it early and stops the workers
//! immediately.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace, warn};

use super::{
  handle::Mailbox,
  mailbox::{Handler, discard, spawn_with_idle},
  message::{Envelope, StopPriority},
  registry::{DispatchError, Registry},
};

/// Spawn a pool of `workers` mailboxes behind one coordinator
///
/// `workers` is clamped to at least one. `factory` is called once per worker
/// with the worker's index.
pub fn spawn<H, F>(registry: &Registry, workers: usize, name: impl Into<String>, mut factory: F) -> Mailbox<H::Payload>
where
  H: Handler,
  F: FnMut(usize) -> H,
{
  let name = name.into();
  let worker_count = workers.max(1);
  let idle = Arc::new(Notify::new());

  let workers: Vec<_> = (0..worker_count)
    .map(|index| spawn_with_idle(registry, format!("{}-{}", name, index), factory(index), idle.clone()))
    .collect();

  let (tx, rx) = mpsc::unbounded_channel();
  let coordinator = Mailbox::new(name, tx, Arc::new(Notify::new()), registry.in_flight().clone());
  debug!(pool = %coordinator.name(), workers = worker_count, "Pool started");

  let pool = RoundRobin { workers, next: 0, idle };
  tokio::spawn(run_coordinator(pool, rx, coordinator.clone()));
  coordinator
}

/// Spawn a pool and route its payload type to the coordinator
pub fn spawn_registered<H, F>(
  registry: &Registry,
  workers: usize,
  name: impl Into<String>,
  factory: F,
) -> Result<Mailbox<H::Payload>, DispatchError>
where
  H: Handler,
  F: FnMut(usize) -> H,
{
  let coordinator = spawn(registry, workers, name, factory);
  if let Err(e) = registry.register(&coordinator) {
    coordinator.request_stop(StopPriority::Immediate);
    return Err(e);
  }
  Ok(coordinator)
}

struct RoundRobin<T> {
  workers: Vec<Mailbox<T>>,
  /// Deliveries routed so far; payload `n` goes to worker `n % len`
  next: usize,
  /// Shared with every worker, woken when one of them goes idle
  idle: Arc<Notify>,
}

impl<T> RoundRobin<T> {
  fn route(&mut self, payload: T) {
    let index = self.next % self.workers.len();
    self.next = self.next.wrapping_add(1);

    let worker = &self.workers[index];
    trace!(worker = %worker.name(), "Routing payload");
    if let Err(e) = worker.post(payload) {
      warn!(worker = %worker.name(), error = %e, "Worker rejected payload");
    }
  }

  fn flush(&self) {
    for worker in &self.workers {
      if let Err(e) = worker.flush() {
        warn!(worker = %worker.name(), error = %e, "Worker rejected flush");
      }
    }
  }

  fn is_idle(&self) -> bool {
    self.workers.iter().all(|w| w.pending() == 0)
  }
}

async fn run_coordinator<T: Send + 'static>(
  mut pool: RoundRobin<T>,
  mut rx: mpsc::UnboundedReceiver<Envelope<T>>,
  coordinator: Mailbox<T>,
) {
  let _stopped = coordinator.stopped_token().drop_guard();

  // Urgency of the worker stops, and the priority their `on_stop` sees
  let (urgency, priority) = loop {
    match rx.recv().await {
      Some(Envelope::Deliver(payload)) => {
        pool.route(payload);
        coordinator.settle();
      }
      Some(Envelope::Flush) => {
        pool.flush();
        coordinator.settle();
      }
      Some(Envelope::Stop {
        priority: StopPriority::Drain,
        original,
      }) => {
        let original = original.unwrap_or(StopPriority::Drain);
        match drain(&mut pool, &mut rx, &coordinator).await {
          Drained::Idle => break (StopPriority::Drain, original),
          Drained::Interrupted => break (StopPriority::Immediate, original),
        }
      }
      Some(Envelope::Stop {
        priority: StopPriority::Immediate,
        original,
      }) => break (StopPriority::Immediate, original.unwrap_or(StopPriority::Immediate)),
      None => break (StopPriority::Immediate, StopPriority::Immediate),
    }
  };

  rx.close();
  let dropped = discard(&mut rx, &coordinator);
  if dropped > 0 {
    warn!(pool = %coordinator.name(), dropped, "Discarded unrouted messages on stop");
  }

  for worker in &pool.workers {
    worker.send_stop(urgency, Some(priority));
    worker.stopped().await;
  }

  debug!(
    pool = %coordinator.name(),
    %priority,
    routed = pool.next,
    "Pool stopped"
  );
}

/// How a coordinator drain ended
enum Drained {
  /// Inbox empty and every worker idle
  Idle,
  /// An immediate stop arrived first
  Interrupted,
}

/// Route everything in the coordinator's inbox until it is empty and every
/// worker has gone idle
async fn drain<T: Send + 'static>(
  pool: &mut RoundRobin<T>,
  rx: &mut mpsc::UnboundedReceiver<Envelope<T>>,
  coordinator: &Mailbox<T>,
) -> Drained {
  let idle = pool.idle.clone();

  loop {
    // Arm the notification before checking, so an idle transition between the
    // check and the wait is not missed
    let notified = idle.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    match rx.try_recv() {
      Ok(Envelope::Deliver(payload)) => {
        pool.route(payload);
        coordinator.settle();
        continue;
      }
      Ok(Envelope::Flush) => {
        pool.flush();
        coordinator.settle();
        continue;
      }
      Ok(Envelope::Stop {
        priority: StopPriority::Immediate,
        ..
      }) => {
        debug!(pool = %coordinator.name(), "Immediate stop requested while draining");
        return Drained::Interrupted;
      }
      Ok(Envelope::Stop {
        priority: StopPriority::Drain,
        ..
      }) => {
        debug!(pool = %coordinator.name(), "Ignoring repeated drain request");
        continue;
      }
      Err(mpsc::error::TryRecvError::Disconnected) => return Drained::Idle,
      Err(mpsc::error::TryRecvError::Empty) => {}
    }

    if pool.is_idle() {
      trace!(pool = %coordinator.name(), "Pool drained");
      return Drained::Idle;
    }

    tokio::select! {
      envelope = rx.recv() => match envelope {
        Some(Envelope::Deliver(payload)) => {
          pool.route(payload);
          coordinator.settle();
        }
        Some(Envelope::Flush) => {
          pool.flush();
          coordinator.settle();
        }
        Some(Envelope::Stop { priority: StopPriority::Immediate, .. }) => {
          debug!(pool = %coordinator.name(), "Immediate stop requested while draining");
          return Drained::Interrupted;
        }
        Some(Envelope::Stop { .. }) => {}
        None => return Drained::Idle,
      },
      _ = &mut notified => {}
    }
  }
}
