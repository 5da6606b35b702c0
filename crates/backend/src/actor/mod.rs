//! Actor-based concurrency primitives
//!
//! This module provides the mailbox engine the enrichment pipeline is built
//! on. Instead of shared-state concurrency with `Arc<Mutex<...>>`, stages
//! communicate by posting typed messages to each other's mailboxes.
//!
//! # Architecture
//!
//! - Each mailbox runs as a long-lived task with its own sequential loop
//! - Inboxes are unbounded `mpsc` channels; stop requests travel in-band
//! - State is owned by the handler, not shared
//! - Stages find each other through the [`Registry`], keyed by payload type
//!
//! # Building blocks
//!
//! - [`Mailbox`]: Handle to a running processor (post, stop)
//! - [`Handler`]: What a processor does with each payload and at shutdown
//! - [`pool`]: Round-robin fan-out over several workers behind one handle
//! - [`Registry`]: Type-keyed routing plus pipeline-wide in-flight tracking
//!
//! # Enrichment Pipeline
//!
//! ```text
//! WordList → Scoring (pool) → Validation → Store (pool)
//!               ↑                 │
//!               └──── rejected ───┘          DeadLetter
//! ```
//!
//! See [`pipeline::Pipeline`] for wiring and the shutdown order.

pub mod handle;
pub mod mailbox;
pub mod message;
pub mod pipeline;
pub mod pool;
pub mod registry;


pub use handle::{Mailbox, SendError};
pub use mailbox::Handler;
pub use message::StopPriority;
pub use registry::{DispatchError, InFlight, Registry};
