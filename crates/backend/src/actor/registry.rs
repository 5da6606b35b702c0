//! Dispatch registry
//!
//! Routes a payload to the one mailbox registered for its type, so a stage can
//! feed the next one (or itself) without holding a reference to it. The
//! registry is an explicit context object: it is built once by the
//! orchestrator and handed to every stage, and cloning it shares the routes.
//!
//! The registry also owns the pipeline-wide [`InFlight`] tracker. Every
//! mailbox spawned against a registry reports its deliveries there.

use std::{
  any::{Any, TypeId, type_name},
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Notify;
use tracing::{debug, trace};

use super::handle::Mailbox;

/// A registered mailbox, type-erased
struct Route {
  mailbox_name: String,
  mailbox: Box<dyn Any + Send + Sync>,
}

/// Type-keyed routing table shared by every stage of a pipeline
#[derive(Clone, Default)]
pub struct Registry {
  routes: Arc<DashMap<TypeId, Route>>,
  in_flight: InFlight,
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("routes", &self.routes.len())
      .field("in_flight", &self.in_flight.count())
      .finish()
  }
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Route every `T` payload to `mailbox`
  ///
  /// A payload type can be routed to exactly one mailbox; registering a second
  /// one is a wiring error.
  pub fn register<T: Send + 'static>(&self, mailbox: &Mailbox<T>) -> Result<(), DispatchError> {
    match self.routes.entry(TypeId::of::<T>()) {
      Entry::Occupied(existing) => Err(DispatchError::Duplicate {
        payload: type_name::<T>(),
        existing: existing.get().mailbox_name.clone(),
      }),
      Entry::Vacant(slot) => {
        debug!(payload = type_name::<T>(), mailbox = %mailbox.name(), "Registered route");
        slot.insert(Route {
          mailbox_name: mailbox.name().to_string(),
          mailbox: Box::new(mailbox.clone()),
        });
        Ok(())
      }
    }
  }

  /// Resolve the mailbox registered for `T`
  pub fn lookup<T: Send + 'static>(&self) -> Result<Mailbox<T>, DispatchError> {
    let unregistered = || DispatchError::Unregistered {
      payload: type_name::<T>(),
    };

    let route = self.routes.get(&TypeId::of::<T>()).ok_or_else(unregistered)?;
    route.mailbox.downcast_ref::<Mailbox<T>>().cloned().ok_or_else(unregistered)
  }

  /// Post `payload` to the mailbox registered for its type
  pub fn dispatch<T: Send + 'static>(&self, payload: T) -> Result<(), DispatchError> {
    let mailbox = self.lookup::<T>()?;
    trace!(payload = type_name::<T>(), mailbox = %mailbox.name(), "Dispatching");
    mailbox.post(payload).map_err(|_| DispatchError::Closed {
      mailbox: mailbox.name().to_string(),
    })
  }

  pub fn is_registered<T: Send + 'static>(&self) -> bool {
    self.routes.contains_key(&TypeId::of::<T>())
  }

  /// Pipeline-wide count of deliveries not yet handled
  pub fn in_flight(&self) -> &InFlight {
    &self.in_flight
  }
}

// ============================================================================
// In-flight tracking
// ============================================================================

/// Counts deliveries that have been posted but not yet handled, across every
/// mailbox spawned against one registry
///
/// A handler that forwards work posts (incrementing) before its own delivery
/// settles (decrementing), so the count only reaches zero once no mailbox has
/// anything left to do.
#[derive(Clone, Default)]
pub struct InFlight {
  inner: Arc<InFlightInner>,
}

#[derive(Default)]
struct InFlightInner {
  count: AtomicUsize,
  /// Deliveries discarded by any mailbox at stop
  dropped: AtomicUsize,
  idle: Notify,
}

impl InFlight {
  pub fn count(&self) -> usize {
    self.inner.count.load(Ordering::Acquire)
  }

  /// Deliveries discarded unhandled, summed over every mailbox (pool workers
  /// included)
  pub fn dropped(&self) -> usize {
    self.inner.dropped.load(Ordering::Acquire)
  }

  pub(crate) fn record_dropped(&self, count: usize) {
    self.inner.dropped.fetch_add(count, Ordering::AcqRel);
  }

  pub(crate) fn enter(&self) {
    self.inner.count.fetch_add(1, Ordering::AcqRel);
  }

  pub(crate) fn exit(&self) {
    if self.inner.count.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.inner.idle.notify_waiters();
    }
  }

  /// Wait until no delivery is queued or being handled anywhere
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.inner.idle.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      if self.count() == 0 {
        return;
      }
      notified.await;
    }
  }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
  #[error("No mailbox registered for payload type {payload}")]
  Unregistered { payload: &'static str },
  #[error("Payload type {payload} is already routed to mailbox '{existing}'")]
  Duplicate { payload: &'static str, existing: String },
  #[error("Mailbox '{mailbox}' has shut down")]
  Closed { mailbox: String },
}
