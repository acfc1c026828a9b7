//! Controlling side: the worker handle and what it is built from.
//!
//! The public API from this module is [`WorkerHandle`], which owns a worker's
//! call router, event bus and channel, plus its [`Config`], [`WorkerBuilder`]
//! and the typed proxy ([`Method`], [`RemoteFn`]).
//!
//! Internal modules:
//! - `handle`: inbound pump, supervision, teardown and graceful termination;
//! - `builder`: builder pattern for handles and the thread-backed shortcut;
//! - `proxy`: typed descriptors and argument/result conversion.

mod builder;
mod config;
mod handle;
mod proxy;

pub use builder::WorkerBuilder;
pub use config::Config;
pub use handle::WorkerHandle;
pub use proxy::{Method, RemoteFn};
