//! # Subject: synchronous multicast to a changing set of observers.
//!
//! ```text
//! next(v) ──► queue ──► snapshot(observers) ──► o1.on_next(&v)
//!                                           ├──► o2.on_next(&v)
//!                                           └──► oN.on_next(&v)
//! ```
//!
//! ## Rules
//! - **Order**: observers are called in subscription order; signals in emit order.
//! - **Snapshot**: each fan-out pass iterates a snapshot taken at its start, so
//!   observers may subscribe/unsubscribe from inside a callback. An observer that
//!   joins mid-pass sees the next signal; one that leaves mid-pass is skipped.
//! - **Re-entrancy**: a signal emitted from inside a callback is queued and
//!   delivered after the current pass finishes, so every observer sees signals in
//!   the same order.
//! - **Cross-thread**: a signal emitted from another thread while a pass is
//!   running waits for that pass, then is delivered before the emit returns.
//!   An observer must not block on another thread that emits into the same subject.
//! - **Terminal**: after `error`/`complete` the observer set is cleared; later
//!   signals and subscriptions are ignored.
//! - **Isolation**: a panicking observer is logged and skipped; others still run.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::panic_message;

use super::observer::{NextFn, Observer};
use super::stream::{SubjectStream, forwarder};
use super::subscription::{Detach, Subscription};

struct Entry<T, E> {
    id: u64,
    active: Arc<AtomicBool>,
    observer: Arc<dyn Observer<T, E>>,
}

enum Signal<T, E> {
    Next(T),
    Error(E),
    Complete,
}

impl<T, E> Signal<T, E> {
    fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Next(_))
    }
}

struct Inner<T, E> {
    next_id: u64,
    entries: Vec<Arc<Entry<T, E>>>,
    queue: VecDeque<Signal<T, E>>,
    /// Thread running the current fan-out pass.
    dispatcher: Option<ThreadId>,
    stopped: bool,
    /// Terminal signal delivered.
    finished: bool,
}

struct Shared<T, E> {
    state: Mutex<Inner<T, E>>,
    idle: Condvar,
}

impl<T: Send, E: Send> Detach for Shared<T, E> {
    fn detach(&self, id: u64) {
        self.state.lock().entries.retain(|entry| entry.id != id);
    }
}

/// Multicast source that is also driven "from the outside".
///
/// Cheap to clone; clones share the same observer set.
pub struct Subject<T, E = Infallible> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static, E: Send + 'static> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, E: Send + 'static> Subject<T, E> {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    next_id: 0,
                    entries: Vec::new(),
                    queue: VecDeque::new(),
                    dispatcher: None,
                    stopped: false,
                    finished: false,
                }),
                idle: Condvar::new(),
            }),
        }
    }

    /// Registers `observer`; it receives every signal emitted from now on.
    ///
    /// On a terminated subject this is a no-op and the returned subscription is inactive.
    pub fn subscribe(&self, observer: Arc<dyn Observer<T, E>>) -> Subscription {
        let mut inner = self.shared.state.lock();
        if inner.stopped {
            return Subscription::closed();
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let active = Arc::new(AtomicBool::new(true));
        inner.entries.push(Arc::new(Entry {
            id,
            active: Arc::clone(&active),
            observer,
        }));
        drop(inner);

        let source: Weak<dyn Detach> = Arc::downgrade(&self.shared) as Weak<dyn Detach>;
        Subscription::new(id, active, source)
    }

    /// Shorthand for subscribing a value-only closure.
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(NextFn::new(f)))
    }

    /// Dispatches `value` to every current observer.
    pub fn next(&self, value: T) {
        self.emit([Signal::Next(value)]);
    }

    /// Dispatches `error` to every current observer, then clears the set.
    pub fn error(&self, error: E) {
        self.emit([Signal::Error(error)]);
    }

    /// Dispatches completion to every current observer, then clears the set.
    pub fn complete(&self) {
        self.emit([Signal::Complete]);
    }

    /// Dispatches `value` then completion; no other signal can come in between.
    pub fn finish(&self, value: T) {
        self.emit([Signal::Next(value), Signal::Complete]);
    }

    /// True once `error` or `complete` has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// True once the terminal signal has been delivered to every observer.
    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    /// Number of currently subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    fn emit<const N: usize>(&self, signals: [Signal<T, E>; N]) {
        let me = thread::current().id();
        let mut inner = self.shared.state.lock();
        while inner.dispatcher.is_some_and(|id| id != me) {
            self.shared.idle.wait(&mut inner);
        }
        for signal in signals {
            if inner.stopped {
                break;
            }
            if signal.is_terminal() {
                inner.stopped = true;
            }
            inner.queue.push_back(signal);
        }
        if inner.dispatcher.is_some() {
            // Re-entrant: the active pass drains the queue.
            return;
        }

        inner.dispatcher = Some(me);
        while let Some(signal) = inner.queue.pop_front() {
            let targets = if signal.is_terminal() {
                std::mem::take(&mut inner.entries)
            } else {
                inner.entries.clone()
            };
            MutexGuard::unlocked(&mut inner, || deliver(&signal, &targets));
        }
        inner.dispatcher = None;
        inner.finished = inner.stopped;
        drop(inner);
        self.shared.idle.notify_all();
    }
}

impl<T, E> Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Returns a stream of `Ok(value)` items, ending after `complete` or after one `Err(error)`.
    ///
    /// Dropping the stream unsubscribes it.
    pub fn stream(&self) -> SubjectStream<T, E> {
        let (observer, rx) = forwarder();
        let subscription = self.subscribe(observer);
        SubjectStream::new(rx, subscription)
    }
}

fn deliver<T, E>(signal: &Signal<T, E>, targets: &[Arc<Entry<T, E>>]) {
    for entry in targets {
        match signal {
            Signal::Next(value) => {
                if entry.active.load(Ordering::Acquire) {
                    guarded(|| entry.observer.on_next(value));
                }
            }
            Signal::Error(error) => {
                if entry.active.swap(false, Ordering::AcqRel) {
                    guarded(|| entry.observer.on_error(error));
                }
            }
            Signal::Complete => {
                if entry.active.swap(false, Ordering::AcqRel) {
                    guarded(|| entry.observer.on_complete());
                }
            }
        }
    }
}

fn guarded(f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let info = panic_message(&*panic);
        tracing::error!(panic = %info, "observer panicked during fan-out");
    }
}
