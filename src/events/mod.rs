//! Worker events: types and the multicast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`EventBus`] synchronous multicast over a [`Subject`](crate::Subject)
//! - [`EventStream`] async view of a bus
//!
//! ## Quick reference
//! - **Publishers**: the handle's inbound pump (messages, internal errors) and
//!   its teardown (termination).
//! - **Consumers**: the handle's own supervision observer, a
//!   [`SubscriberSet`](crate::SubscriberSet), and user callbacks/streams.

mod bus;
mod event;

pub use bus::{EventBus, EventStream};
pub use event::{Event, EventKind};
