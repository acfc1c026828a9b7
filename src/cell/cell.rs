//! # ResultCell: the outcome of one remote call.
//!
//! A cell is a tiny state machine plus a [`Subject`] for notification:
//!
//! ```text
//!            push(v) ──► Update::Progress(v) to current observers
//!           ┌──────┐
//!           ▼      │
//!       ┌─────────┐│  resolve(v) ──► Update::Done(v), complete
//!       │ Pending ├┘──────────────────────────────────────────┐
//!       └────┬────┘                                           ▼
//!            │   reject(e)  ──► error(e)                ┌─────────┐
//!            └─────────────────────────────────────────►│ Settled │
//!                                                       └─────────┘
//! ```
//!
//! Two views share that state:
//! - **future**: `cell.await` (or [`ResultCell::wait`]) yields the terminal outcome;
//! - **stream**: [`ResultCell::updates`] yields progress values then the terminal one.
//!
//! ## Rules
//! - Settles **at most once**; later `resolve`/`reject` calls are ignored.
//! - Progress values are **not replayed**: observers only see values pushed
//!   after they subscribed.
//! - The terminal outcome **is replayed**: attaching to a settled cell observes
//!   it immediately.

use std::future::IntoFuture;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::CallError;
use crate::subject::{Observer, Subject, SubjectStream, Subscription, forwarder};

/// One signal of the stream view.
#[derive(Debug, Clone, PartialEq)]
pub enum Update<T> {
    /// Intermediate value.
    Progress(T),
    /// Terminal success value; nothing follows.
    Done(T),
}

impl<T> Update<T> {
    /// Returns the carried value.
    pub fn into_inner(self) -> T {
        match self {
            Update::Progress(v) | Update::Done(v) => v,
        }
    }

    /// True for [`Update::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Update::Done(_))
    }
}

struct Shared<T> {
    outcome: Mutex<Option<Result<T, CallError>>>,
    updates: Subject<Update<T>, CallError>,
    settled: Notify,
}

/// Dual future/stream value representing one outstanding call.
///
/// Cheap to clone; clones observe the same state.
///
/// ## Example
/// ```rust
/// use workerbridge::ResultCell;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cell: ResultCell<&'static str> = ResultCell::new();
/// cell.push("25%");
/// cell.resolve("done");
/// assert_eq!(cell.await, Ok("done"));
/// # }
/// ```
pub struct ResultCell<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResultCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for ResultCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.shared.outcome.lock() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("ResultCell").field("state", &state).finish()
    }
}

impl<T> Default for ResultCell<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultCell<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending cell with no observers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: Mutex::new(None),
                updates: Subject::new(),
                settled: Notify::new(),
            }),
        }
    }

    /// Creates a cell that is already rejected with `error`.
    pub fn rejected(error: CallError) -> Self {
        let cell = Self::new();
        cell.reject(error);
        cell
    }

    /// Broadcasts an intermediate value to current observers.
    ///
    /// # Panics
    /// If the cell is already settled: a progress value after the terminal one
    /// is a protocol violation by the producer.
    pub fn push(&self, value: T) {
        assert!(
            self.is_pending(),
            "progress value pushed to an already settled call"
        );
        self.shared.updates.next(Update::Progress(value));
    }

    /// Like [`push`](Self::push), but drops the value if the cell is settled.
    pub(crate) fn offer(&self, value: T) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.shared.updates.next(Update::Progress(value));
        true
    }

    /// Settles with a success value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        if !self.settle(Ok(value.clone())) {
            return false;
        }
        self.shared.updates.next(Update::Done(value));
        self.shared.updates.complete();
        true
    }

    /// Settles with a failure. Returns `false` if already settled.
    pub fn reject(&self, error: CallError) -> bool {
        if !self.settle(Err(error.clone())) {
            return false;
        }
        self.shared.updates.error(error);
        true
    }

    fn settle(&self, outcome: Result<T, CallError>) -> bool {
        {
            let mut slot = self.shared.outcome.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        self.shared.settled.notify_waiters();
        true
    }

    /// True until settled.
    pub fn is_pending(&self) -> bool {
        self.shared.outcome.lock().is_none()
    }

    /// The terminal outcome, if settled.
    pub fn outcome(&self) -> Option<Result<T, CallError>> {
        self.shared.outcome.lock().clone()
    }

    /// Attaches an observer.
    ///
    /// - Pending cell: the observer sees future progress values and the terminal signal.
    /// - Settled cell: the terminal signal is delivered right away; the
    ///   returned subscription is inactive.
    pub fn subscribe(&self, observer: Arc<dyn Observer<Update<T>, CallError>>) -> Subscription {
        let settled = {
            let outcome = self.shared.outcome.lock();
            match &*outcome {
                None => return self.shared.updates.subscribe(observer),
                Some(outcome) => outcome.clone(),
            }
        };
        match settled {
            Ok(value) => {
                observer.on_next(&Update::Done(value));
                observer.on_complete();
            }
            Err(error) => observer.on_error(&error),
        }
        Subscription::closed()
    }

    /// Stream view: `Ok(Update::Progress(..))*` then `Ok(Update::Done(..))` or one `Err(..)`.
    pub fn updates(&self) -> SubjectStream<Update<T>, CallError> {
        let (observer, rx) = forwarder();
        let subscription = self.subscribe(observer);
        SubjectStream::new(rx, subscription)
    }

    /// Waits for the terminal outcome.
    pub async fn wait(&self) -> Result<T, CallError> {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Derives a cell whose values are `f` applied to this cell's values.
    ///
    /// A conversion failure rejects the derived cell.
    pub fn map<U, F>(&self, f: F) -> ResultCell<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Result<U, CallError> + Send + Sync + 'static,
    {
        let target = ResultCell::new();
        self.subscribe(Arc::new(MapInto {
            target: target.clone(),
            f,
        }));
        target
    }
}

impl<T> IntoFuture for ResultCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T, CallError>;
    type IntoFuture = BoxFuture<'static, Result<T, CallError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

/// Forwards one cell's signals into another through a conversion.
struct MapInto<U, F> {
    target: ResultCell<U>,
    f: F,
}

impl<T, U, F> Observer<Update<T>, CallError> for MapInto<U, F>
where
    T: Clone,
    U: Clone + Send + 'static,
    F: Fn(T) -> Result<U, CallError> + Send + Sync,
{
    fn on_next(&self, update: &Update<T>) {
        match update {
            Update::Progress(value) => match (self.f)(value.clone()) {
                Ok(mapped) => {
                    self.target.offer(mapped);
                }
                Err(error) => {
                    self.target.reject(error);
                }
            },
            Update::Done(value) => {
                match (self.f)(value.clone()) {
                    Ok(mapped) => self.target.resolve(mapped),
                    Err(error) => self.target.reject(error),
                };
            }
        }
    }

    fn on_error(&self, error: &CallError) {
        self.target.reject(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::NextFn;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_progress_then_done() {
        let cell: ResultCell<String> = ResultCell::new();
        let stream = cell.updates();

        cell.push("25%".into());
        cell.push("75%".into());
        assert!(cell.resolve("done".into()));

        let items: Vec<_> = stream.collect().await;
        assert_eq!(
            items,
            vec![
                Ok(Update::Progress("25%".to_string())),
                Ok(Update::Progress("75%".to_string())),
                Ok(Update::Done("done".to_string())),
            ]
        );
        assert_eq!(cell.await, Ok("done".to_string()));
    }

    #[tokio::test]
    async fn test_settles_at_most_once() {
        let cell: ResultCell<u32> = ResultCell::new();
        assert!(cell.resolve(1));
        assert!(!cell.reject(CallError::terminated("late")));
        assert!(!cell.resolve(2));
        assert_eq!(cell.wait().await, Ok(1));

        let cell: ResultCell<u32> = ResultCell::new();
        assert!(cell.reject(CallError::terminated("first")));
        assert!(!cell.resolve(3));
        assert_eq!(cell.wait().await, Err(CallError::terminated("first")));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_terminal_only() {
        let cell: ResultCell<u32> = ResultCell::new();
        cell.push(10);
        cell.resolve(20);

        let items: Vec<_> = cell.updates().collect().await;
        assert_eq!(items, vec![Ok(Update::Done(20))]);

        let rejected: ResultCell<u32> = ResultCell::rejected(CallError::terminated("gone"));
        let items: Vec<_> = rejected.updates().collect().await;
        assert_eq!(items, vec![Err(CallError::terminated("gone"))]);
    }

    #[test]
    fn test_mid_stream_subscriber_misses_earlier_progress() {
        let cell: ResultCell<u32> = ResultCell::new();
        cell.push(1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        cell.subscribe(Arc::new(NextFn::new(move |u: &Update<u32>| {
            log.lock().push(u.clone())
        })));

        cell.push(2);
        cell.resolve(3);
        assert_eq!(*seen.lock(), vec![Update::Progress(2), Update::Done(3)]);
    }

    #[test]
    #[should_panic(expected = "already settled")]
    fn test_push_after_settle_panics() {
        let cell: ResultCell<u32> = ResultCell::new();
        cell.resolve(1);
        cell.push(2);
    }

    #[tokio::test]
    async fn test_wait_from_another_task() {
        let cell: ResultCell<u32> = ResultCell::new();
        let waiter = tokio::spawn(cell.clone().into_future());
        tokio::task::yield_now().await;
        cell.resolve(42);
        assert_eq!(waiter.await.unwrap(), Ok(42));
    }

    #[tokio::test]
    async fn test_map_converts_values_and_errors() {
        let cell: ResultCell<u32> = ResultCell::new();
        let doubled = cell.map(|v| Ok(v * 2));
        let stream = doubled.updates();

        cell.push(1);
        cell.resolve(5);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![Ok(Update::Progress(2)), Ok(Update::Done(10))]);

        let cell: ResultCell<u32> = ResultCell::new();
        let failing: ResultCell<u32> = cell.map(|_| Err(CallError::Decode("nope".into())));
        cell.resolve(1);
        assert_eq!(failing.await, Err(CallError::Decode("nope".into())));

        let cell: ResultCell<u32> = ResultCell::new();
        let mapped = cell.map(|v| Ok(v + 1));
        cell.reject(CallError::terminated("bye"));
        assert!(mapped.await.unwrap_err().is_terminated());
    }
}
