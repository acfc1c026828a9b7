//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], an extension point for plugging slow or async event
//! handlers into a worker's [`EventBus`](crate::EventBus).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the event **for this subscriber only** (warn).
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use workerbridge::{Event, EventKind, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Termination {
//!             // write audit record...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "audit" }
//!     fn queue_capacity(&self) -> usize { 512 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for async event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
