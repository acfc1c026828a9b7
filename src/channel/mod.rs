//! # Channels to workers.
//!
//! [`WorkerChannel`] is the seam between a [`WorkerHandle`](crate::WorkerHandle)
//! and whatever hosts the worker. [`ThreadChannel`] is the bundled host: a
//! dedicated OS thread with its own runtime.

mod channel;
mod thread;

pub use channel::{ChannelEvent, Connection, Inbound, WorkerChannel};
pub use thread::ThreadChannel;
