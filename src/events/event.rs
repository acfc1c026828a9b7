//! # Worker events published on a handle's event bus.
//!
//! The [`EventKind`] enum classifies what a worker reported:
//! - **Message**: every frame the worker posted (protocol responses included)
//! - **InternalError**: a channel or worker failure not tied to one call
//! - **Termination**: the worker is gone; always the last event of a bus
//!
//! The [`Event`] struct carries the metadata: timestamp, worker name, payload,
//! error and termination reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use workerbridge::{Event, EventKind};
//!
//! let ev = Event::message("resize", json!({"w": 640}));
//!
//! assert_eq!(ev.kind, EventKind::Message);
//! assert_eq!(ev.worker.as_ref(), "resize");
//! assert_eq!(ev.data.as_deref(), Some(&json!({"w": 640})));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde_json::Value;

use crate::error::ChannelError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of worker events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The worker posted a frame.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `data`: the frame as received
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    Message,

    /// The channel or the worker failed.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `error`: what failed
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    InternalError,

    /// The worker terminated; in-flight calls were rejected.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: why the worker went away
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    Termination,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::InternalError => "internal_error",
            EventKind::Termination => "termination",
        }
    }
}

/// Worker event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the worker that produced the event.
    pub worker: Arc<str>,
    /// Frame payload ([`EventKind::Message`]).
    pub data: Option<Arc<Value>>,
    /// Failure ([`EventKind::InternalError`]).
    pub error: Option<ChannelError>,
    /// Human-readable reason ([`EventKind::Termination`]).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind, worker: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: worker.into(),
            data: None,
            error: None,
            reason: None,
        }
    }

    /// Attaches a payload.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Attaches a failure.
    #[inline]
    pub fn with_error(mut self, error: ChannelError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a message event.
    #[inline]
    pub fn message(worker: impl Into<Arc<str>>, data: Value) -> Self {
        Event::new(EventKind::Message, worker).with_data(data)
    }

    /// Creates an internal error event.
    #[inline]
    pub fn internal_error(worker: impl Into<Arc<str>>, error: ChannelError) -> Self {
        Event::new(EventKind::InternalError, worker).with_error(error)
    }

    /// Creates a termination event.
    #[inline]
    pub fn termination(worker: impl Into<Arc<str>>, reason: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::Termination, worker).with_reason(reason)
    }

    #[inline]
    pub fn is_message(&self) -> bool {
        matches!(self.kind, EventKind::Message)
    }

    #[inline]
    pub fn is_internal_error(&self) -> bool {
        matches!(self.kind, EventKind::InternalError)
    }

    #[inline]
    pub fn is_termination(&self) -> bool {
        matches!(self.kind, EventKind::Termination)
    }
}
