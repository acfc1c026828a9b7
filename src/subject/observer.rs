//! # Observer contract
//!
//! An [`Observer`] is the handler a [`Subject`](crate::Subject) dispatches to.
//! The subject holds it behind an `Arc` only while subscribed; whoever
//! subscribed keeps ownership through the returned
//! [`Subscription`](crate::Subscription).

/// Receiver of `next` / `error` / `complete` signals.
///
/// Called synchronously from the thread that emits the signal. Implementations
/// should return quickly; anything slow belongs behind a queue (see
/// [`SubscriberSet`](crate::SubscriberSet)).
pub trait Observer<T, E>: Send + Sync {
    /// A value was emitted.
    fn on_next(&self, value: &T);

    /// The source failed; no further signal follows.
    fn on_error(&self, _error: &E) {}

    /// The source completed; no further signal follows.
    fn on_complete(&self) {}
}

/// Observer built from a closure that only cares about values.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use workerbridge::{NextFn, Subject};
///
/// let subject: Subject<u32> = Subject::new();
/// let sub = subject.subscribe(Arc::new(NextFn::new(|v: &u32| println!("got {v}"))));
/// subject.next(1);
/// sub.unsubscribe();
/// ```
pub struct NextFn<F> {
    f: F,
}

impl<F> NextFn<F> {
    /// Wraps `f` as an observer.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, E, F> Observer<T, E> for NextFn<F>
where
    F: Fn(&T) + Send + Sync,
{
    fn on_next(&self, value: &T) {
        (self.f)(value)
    }
}
