//! # SubscriberSet: non-blocking fan-out over async subscribers
//!
//! [`SubscriberSet`] sits on an [`EventBus`](crate::EventBus) as one synchronous
//! observer and forwards each [`Event`] to multiple [`Subscribe`] implementations
//! **without awaiting** their processing.
//!
//! ## Diagram
//! ```text
//!    on_next(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//!
//!    on_complete() ──► close queues ──► workers drain and exit
//! ```
//!
//! ## What it guarantees
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - Events queued before the bus completed are still handled.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::error::panic_message;
use crate::events::Event;
use crate::subject::Observer;

use super::Subscribe;

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Mutex<Vec<SubscriberChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                        error!(
                            subscriber = sub.name(),
                            panic = %panic_message(&*panic),
                            "subscriber panicked"
                        );
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
        }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped for it
    /// and a warning is logged with the subscriber's name.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in self.channels.lock().iter() {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: worker closed");
                }
            }
        }
    }

    /// Closes all queues and awaits worker completion.
    ///
    /// Events already queued are handled first.
    pub async fn shutdown(&self) {
        self.channels.lock().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for h in workers {
            let _ = h.await;
        }
    }

    /// True if there are no open subscriber queues.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Number of open subscriber queues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }
}

impl Observer<Event, Infallible> for SubscriberSet {
    fn on_next(&self, event: &Event) {
        self.emit(event);
    }

    fn on_complete(&self) {
        self.channels.lock().clear();
    }
}
