//! # Event bus for one worker.
//!
//! [`EventBus`] is a thin wrapper around a [`Subject`] that multicasts every
//! [`Event`] synchronously to all current subscribers.
//!
//! ## Architecture
//! ```text
//! Publishers:                         Subscribers (many):
//!   inbound pump ──┐                   ┌──► supervision (handle teardown)
//!                  ├──► EventBus ──────┼──► SubscriberSet ──► Subscribe impls
//!   teardown ──────┘    (Subject)      └──► EventStream / user callbacks
//! ```
//!
//! ## Rules
//! - **Synchronous**: `publish()` calls every subscriber before returning.
//! - **Same order everywhere**: an event published from inside a subscriber is
//!   delivered after the current one, to everybody.
//! - **Terminal**: a [`Termination`](EventKind::Termination) event completes the bus;
//!   later events are dropped and streams end.
//! - **Cross-thread**: a publish racing a fan-out on another thread waits for it,
//!   so `publish()` always returns after delivery.
//! - **No persistence**: a subscriber only sees events published after it subscribed.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, future};
use tokio::sync::Notify;

use crate::error::ChannelError;
use crate::subject::{Observer, Subject, SubjectStream, Subscription};

use super::event::{Event, EventKind};

/// Multicast channel for a worker's events.
///
/// Cheap to clone; clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subject: Subject<Event>,
    closed: Arc<Notify>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an event to all current subscribers.
    ///
    /// A [`Termination`](EventKind::Termination) event closes the bus after delivery.
    pub fn publish(&self, ev: Event) {
        if ev.kind == EventKind::Termination {
            self.subject.finish(ev);
        } else {
            self.subject.next(ev);
        }
        // A nested publish returns before delivery; the outermost one sees the finish.
        if self.subject.is_finished() {
            self.closed.notify_waiters();
        }
    }

    /// Resolves once the termination event was delivered to every subscriber.
    pub async fn closed(&self) {
        loop {
            let notified = self.closed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.subject.is_finished() {
                return;
            }
            notified.await;
        }
    }

    /// Attaches an observer; it sees events published from now on.
    pub fn subscribe(&self, observer: Arc<dyn Observer<Event, Infallible>>) -> Subscription {
        self.subject.subscribe(observer)
    }

    /// Attaches a callback; it sees events published from now on.
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subject.subscribe_fn(f)
    }

    /// Stream of events published from now on; ends after termination.
    pub fn stream(&self) -> EventStream {
        EventStream {
            inner: self.subject.stream(),
        }
    }

    /// Failures reported by internal error events, from now on; ends after termination.
    pub fn errors(&self) -> impl Stream<Item = ChannelError> + Send + 'static {
        self.stream().filter_map(|ev| future::ready(ev.error))
    }

    /// True once a termination event was published.
    pub fn is_closed(&self) -> bool {
        self.subject.is_stopped()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subject.observer_count()
    }
}

/// Stream returned by [`EventBus::stream`].
pub struct EventStream {
    inner: SubjectStream<Event, Infallible>,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(ev))) => Poll::Ready(Some(ev)),
            Poll::Ready(Some(Err(never))) => match never {},
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
