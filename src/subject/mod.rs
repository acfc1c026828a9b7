//! Multicast primitive shared by result cells and the worker event bus.
//!
//! ## Contents
//! - [`Subject`] synchronous broadcast of `next` / `error` / `complete`
//! - [`Observer`], [`NextFn`] the receiving side
//! - [`Subscription`] idempotent detach handle
//! - [`SubjectStream`] `futures::Stream` view over one subscription

mod observer;
mod stream;
mod subject;
mod subscription;

pub use observer::{NextFn, Observer};
pub use stream::SubjectStream;
pub use subject::Subject;
pub use subscription::Subscription;

pub(crate) use stream::forwarder;
