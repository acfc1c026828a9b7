//! # Worker side: what runs behind a channel.
//!
//! - [`Function`] / [`FunctionFn`]: callable units with a stable name.
//! - [`Exposed`]: a single function or a module of named methods.
//! - [`CallContext`]: per-call progress reporting, raw messages and cancellation.
//!
//! The dispatch loop is crate-private; [`ThreadChannel`](crate::ThreadChannel)
//! drives it on a dedicated thread.

mod context;
mod expose;
mod function;
mod serve;

pub use context::CallContext;
pub use expose::Exposed;
pub use function::{BoxCallFuture, Function, FunctionFn, FunctionRef};

pub(crate) use serve::serve;
