//! # Channel contract between a handle and its worker.
//!
//! The spawning side is an external collaborator; the handle only needs:
//! - [`WorkerChannel::send`] fire-and-forget delivery of a frame to the worker;
//! - an inbound queue of [`ChannelEvent`]s (the handle's pump is its single reader);
//! - [`WorkerChannel::terminate`] to request/force shutdown.
//!
//! ```text
//!  WorkerHandle ── send(frame) ──────────────► worker
//!       ▲                                       │
//!       └──── pump ◄── Inbound ◄── ChannelEvent ┘
//!                         Frame(Value) | Error(ChannelError) | Exit{code}
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Something the channel reports about the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A frame posted by the worker (protocol response or raw message).
    Frame(Value),
    /// The channel or the worker failed.
    Error(ChannelError),
    /// The worker has stopped.
    Exit {
        /// Exit code, when the transport knows one.
        code: Option<i32>,
    },
}

/// Receiving side of a channel's events.
pub type Inbound = mpsc::UnboundedReceiver<ChannelEvent>;

/// Outbound side of a worker channel.
pub trait WorkerChannel: Send + Sync + 'static {
    /// Enqueues `frame` for the worker. Must not block.
    fn send(&self, frame: Value) -> Result<(), ChannelError>;

    /// Requests the worker to stop. Idempotent.
    ///
    /// A [`ChannelEvent::Exit`] is expected once the worker is gone.
    fn terminate(&self);
}

/// A live channel: outbound half plus its inbound events.
pub struct Connection {
    /// Outbound half, shared with the router.
    pub channel: Arc<dyn WorkerChannel>,
    /// Inbound events; consumed by exactly one handle.
    pub inbound: Inbound,
}

impl Connection {
    /// Bundles a channel with its inbound queue.
    pub fn new(channel: Arc<dyn WorkerChannel>, inbound: Inbound) -> Self {
        Self { channel, inbound }
    }
}
