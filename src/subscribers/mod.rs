//! # Async event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that
//! bridges a synchronous [`EventBus`](crate::EventBus) to async handlers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   pump ── publish(Event) ──► EventBus ──► SubscriberSet (one observer)
//!                                               │
//!                                     ┌─────────┼─────────┐
//!                                     ▼         ▼         ▼
//!                                 LogWriter  Metrics    Custom
//! ```
//!
//! ## Choosing a subscription style
//! - **Callback** ([`EventBus::subscribe_fn`](crate::EventBus::subscribe_fn)): runs
//!   inline on the publishing thread; must be quick.
//! - **Stream** ([`EventBus::stream`](crate::EventBus::stream)): pull at your own pace.
//! - **[`Subscribe`]**: async, queued, panic-isolated.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
