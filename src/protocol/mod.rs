//! Call protocol spoken between a worker handle and its worker.
//!
//! ## Frames
//! ```text
//! handle ──► worker:  CallFrame     { id, function, args }
//! worker ──► handle:  ResponseFrame { id, kind: progress, value }   (0..n)
//!                     ResponseFrame { id, kind: result,   value }   (terminal)
//!                     ResponseFrame { id, kind: error,    error }   (terminal)
//! ```
//!
//! Frames are transport-agnostic `serde_json::Value`s. Anything the worker sends
//! without a recognised `kind` is a raw message and is only visible on the event bus.

mod frame;

pub use frame::{CallFrame, CallId, ResponseFrame, SerializedError};
