//! Error types used by the call router, the worker handle and channels.
//!
//! This module defines three enums:
//!
//! - [`CallError`]: the failure a single call's [`ResultCell`](crate::ResultCell) settles with.
//! - [`ChannelError`]: failures of the transport or the worker itself (not tied to one call).
//! - [`RuntimeError`]: failures of the handle's own teardown sequence.
//!
//! All of them provide `as_label` for logs/metrics.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{CallId, SerializedError};

/// # Errors produced by the channel to a worker.
///
/// These are not attributable to one call identifier; they surface on the
/// worker event bus as *internal error* events.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel no longer accepts frames (worker gone or terminated).
    #[error("channel closed")]
    Closed,

    /// An inbound frame claimed to be a protocol frame but could not be decoded.
    #[error("malformed frame: {0}")]
    Decode(Arc<str>),

    /// The worker could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(Arc<str>),

    /// The worker died unexpectedly.
    #[error("worker crashed: {0}")]
    Crashed(Arc<str>),
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::Closed => "channel_closed",
            ChannelError::Decode(_) => "channel_decode",
            ChannelError::Spawn(_) => "channel_spawn",
            ChannelError::Crashed(_) => "channel_crashed",
        }
    }
}

/// # Errors a call can settle with.
///
/// A caller of a remote function observes exactly one of: a normal value,
/// a call-specific failure ([`CallError::Remote`]), or a termination failure
/// ([`CallError::Terminated`]).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The remote function failed; the error was reconstructed from its serialized form.
    #[error("remote call failed: {0}")]
    Remote(SerializedError),

    /// The worker terminated (or was terminated) before the call settled.
    #[error("worker terminated: {reason}")]
    Terminated {
        /// Why the worker went away.
        reason: Arc<str>,
    },

    /// The call frame could not be handed to the channel.
    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    /// Typed arguments could not be converted to the wire payload.
    #[error("failed to encode call arguments: {0}")]
    Encode(Arc<str>),

    /// A wire payload could not be converted to the typed result.
    #[error("failed to decode call result: {0}")]
    Decode(Arc<str>),
}

impl CallError {
    /// Builds a termination failure.
    pub fn terminated(reason: impl Into<Arc<str>>) -> Self {
        CallError::Terminated {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workerbridge::CallError;
    ///
    /// let err = CallError::terminated("shutdown");
    /// assert_eq!(err.as_label(), "call_terminated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CallError::Remote(_) => "call_remote",
            CallError::Terminated { .. } => "call_terminated",
            CallError::Channel(_) => "call_channel",
            CallError::Encode(_) => "call_encode",
            CallError::Decode(_) => "call_decode",
        }
    }

    /// True if the call was cut short by worker termination.
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallError::Terminated { .. })
    }
}

/// # Errors produced by the worker handle runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// In-flight calls did not settle within the grace period; they were rejected
    /// and the worker was terminated anyway.
    #[error("termination grace {grace:?} exceeded; stuck calls: {stuck:?}; forced termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Identifiers of the calls still pending when the grace period ran out.
        stuck: Vec<CallId>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workerbridge::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(1), stuck: vec![3] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
