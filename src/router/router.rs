//! # Call router - per-worker table of in-flight calls.
//!
//! Allocates call identifiers, sends call frames and demultiplexes response
//! frames to the [`ResultCell`] of the call that produced them.
//!
//! ## Architecture
//! ```text
//! invoke(function, args)
//!   ├─► id = next_id++           (never reused while in flight)
//!   ├─► calls[id] = cell
//!   └─► channel.send({id, function, args}) ──► worker
//!
//! on_frame(frame)
//!   ├─► result   → remove(id) → cell.resolve(value)
//!   ├─► error    → remove(id) → cell.reject(Remote(error))
//!   └─► progress → calls[id] (if pending) → cell.push(value)
//!
//! terminate_all(reason)
//!   └─► drain table → every cell.reject(Terminated{reason})
//! ```
//!
//! ## Rules
//! - Frames for unknown or settled ids are dropped silently.
//! - Cells are settled outside the table lock; observers may call back into the router.
//! - After [`CallRouter::close`] new calls are rejected without reaching the channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::cell::ResultCell;
use crate::channel::WorkerChannel;
use crate::error::CallError;
use crate::protocol::{CallFrame, CallId, ResponseFrame};

struct RouterState {
    next_id: CallId,
    calls: BTreeMap<CallId, ResultCell<Value>>,
    closed: Option<Arc<str>>,
}

/// In-flight call table of one worker.
pub struct CallRouter {
    channel: Arc<dyn WorkerChannel>,
    state: Mutex<RouterState>,
    drained: Notify,
}

impl CallRouter {
    /// Creates an empty router sending through `channel`.
    pub fn new(channel: Arc<dyn WorkerChannel>) -> Self {
        Self {
            channel,
            state: Mutex::new(RouterState {
                next_id: 1,
                calls: BTreeMap::new(),
                closed: None,
            }),
            drained: Notify::new(),
        }
    }

    /// Dispatches a call and returns its cell immediately.
    ///
    /// `function` is `None` for a worker exposing a single function.
    /// Failures to send settle the returned cell instead of being returned.
    pub fn invoke(&self, function: Option<&str>, args: Vec<Value>) -> ResultCell<Value> {
        let (id, cell) = {
            let mut state = self.state.lock();
            if let Some(reason) = &state.closed {
                return ResultCell::rejected(CallError::terminated(reason.clone()));
            }
            let id = state.next_id;
            state.next_id += 1;
            let cell = ResultCell::new();
            state.calls.insert(id, cell.clone());
            (id, cell)
        };

        let sent = CallFrame::new(id, function, args)
            .to_value()
            .map_err(|e| CallError::Encode(e.to_string().into()))
            .and_then(|frame| self.channel.send(frame).map_err(CallError::from));

        match sent {
            Ok(()) => trace!(id, function, "call dispatched"),
            Err(err) => {
                warn!(id, function, error = %err, "call could not be dispatched");
                if self.remove(id).is_some() {
                    cell.reject(err);
                }
            }
        }
        cell
    }

    /// Routes one response frame to its call.
    pub fn on_frame(&self, frame: ResponseFrame) {
        match frame {
            ResponseFrame::Result { id, value } => match self.remove(id) {
                Some(cell) => {
                    cell.resolve(value);
                }
                None => trace!(id, "result for unknown call dropped"),
            },
            ResponseFrame::Error { id, error } => match self.remove(id) {
                Some(cell) => {
                    cell.reject(CallError::Remote(error));
                }
                None => trace!(id, "error for unknown call dropped"),
            },
            ResponseFrame::Progress { id, value } => {
                let cell = self.state.lock().calls.get(&id).cloned();
                if !cell.is_some_and(|cell| cell.offer(value)) {
                    trace!(id, "progress for unknown call dropped");
                }
            }
        }
    }

    /// Rejects every in-flight call with a termination failure and empties the table.
    ///
    /// Returns how many calls were rejected; a second call returns `0`.
    pub fn terminate_all(&self, reason: &str) -> usize {
        let calls = std::mem::take(&mut self.state.lock().calls);
        let count = calls.len();
        if count > 0 {
            debug!(count, reason, "rejecting in-flight calls");
        }
        let reason: Arc<str> = reason.into();
        for cell in calls.into_values() {
            cell.reject(CallError::terminated(reason.clone()));
        }
        self.drained.notify_waiters();
        count
    }

    /// Stops accepting new calls; in-flight calls keep running.
    pub fn close(&self, reason: &str) {
        let mut state = self.state.lock();
        if state.closed.is_none() {
            state.closed = Some(reason.into());
        }
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    /// Number of calls awaiting a terminal frame.
    pub fn in_flight(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Identifiers of calls awaiting a terminal frame, ascending.
    pub fn in_flight_ids(&self) -> Vec<CallId> {
        self.state.lock().calls.keys().copied().collect()
    }

    /// Resolves once no call is in flight.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn remove(&self, id: CallId) -> Option<ResultCell<Value>> {
        let mut state = self.state.lock();
        let cell = state.calls.remove(&id);
        if cell.is_some() && state.calls.is_empty() {
            self.drained.notify_waiters();
        }
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Update;
    use crate::error::ChannelError;
    use crate::protocol::SerializedError;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Value>>,
        fail: AtomicBool,
    }

    impl WorkerChannel for Recording {
        fn send(&self, frame: Value) -> Result<(), ChannelError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            self.sent.lock().push(frame);
            Ok(())
        }

        fn terminate(&self) {}
    }

    fn router() -> (Arc<Recording>, CallRouter) {
        let channel = Arc::new(Recording::default());
        let router = CallRouter::new(channel.clone());
        (channel, router)
    }

    fn progress_log(cell: &ResultCell<Value>) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cell.subscribe(Arc::new(crate::subject::NextFn::new(move |u: &Update<Value>| {
            if let Update::Progress(v) = u {
                sink.lock().push(v.clone());
            }
        })));
        seen
    }

    #[tokio::test]
    async fn test_progress_then_result() {
        let (channel, router) = router();
        let cell = router.invoke(Some("work"), vec![json!(1)]);
        assert_eq!(
            channel.sent.lock()[0],
            json!({"id": 1, "function": "work", "args": [1]})
        );
        let seen = progress_log(&cell);

        router.on_frame(ResponseFrame::Progress { id: 1, value: json!("25%") });
        router.on_frame(ResponseFrame::Progress { id: 1, value: json!("75%") });
        router.on_frame(ResponseFrame::Result { id: 1, value: json!("done") });

        assert_eq!(*seen.lock(), vec![json!("25%"), json!("75%")]);
        assert_eq!(cell.await, Ok(json!("done")));
        assert_eq!(router.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let (_channel, router) = router();
        let a = router.invoke(Some("a"), vec![]);
        let b = router.invoke(Some("b"), vec![]);
        assert_eq!(router.in_flight_ids(), vec![1, 2]);

        router.on_frame(ResponseFrame::Result { id: 2, value: json!("B") });
        router.on_frame(ResponseFrame::Result { id: 1, value: json!("A") });

        assert_eq!(a.await, Ok(json!("A")));
        assert_eq!(b.await, Ok(json!("B")));
    }

    #[tokio::test]
    async fn test_remote_error_settles_only_its_call() {
        let (_channel, router) = router();
        let failing = router.invoke(None, vec![]);
        let other = router.invoke(None, vec![]);

        router.on_frame(ResponseFrame::Error {
            id: 1,
            error: SerializedError::new("TypeError", "bad"),
        });

        assert_eq!(
            failing.await,
            Err(CallError::Remote(SerializedError::new("TypeError", "bad")))
        );
        assert!(other.is_pending());
        assert_eq!(router.in_flight_ids(), vec![2]);
    }

    #[test]
    fn test_frames_for_unknown_or_settled_ids_are_dropped() {
        let (_channel, router) = router();
        let cell = router.invoke(None, vec![]);
        router.on_frame(ResponseFrame::Result { id: 99, value: json!(0) });
        router.on_frame(ResponseFrame::Progress { id: 99, value: json!(0) });
        assert!(cell.is_pending());

        router.on_frame(ResponseFrame::Result { id: 1, value: json!("first") });
        router.on_frame(ResponseFrame::Progress { id: 1, value: json!("late") });
        router.on_frame(ResponseFrame::Error {
            id: 1,
            error: SerializedError::new("Error", "late"),
        });
        assert_eq!(cell.outcome(), Some(Ok(json!("first"))));
    }

    #[test]
    fn test_ids_are_fresh_across_settled_calls() {
        let (channel, router) = router();
        router.invoke(None, vec![]);
        router.on_frame(ResponseFrame::Result { id: 1, value: json!(null) });
        router.invoke(None, vec![]);
        router.invoke(None, vec![]);

        let ids: Vec<_> = channel.sent.lock().iter().map(|f| f["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_terminate_all_rejects_everything_once() {
        let (_channel, router) = router();
        let cells: Vec<_> = (0..3).map(|_| router.invoke(None, vec![])).collect();

        assert_eq!(router.terminate_all("worker exited"), 3);
        assert_eq!(router.terminate_all("again"), 0);
        assert_eq!(router.in_flight(), 0);

        for cell in cells {
            assert_eq!(cell.await, Err(CallError::terminated("worker exited")));
        }
    }

    #[tokio::test]
    async fn test_send_failure_rejects_and_forgets_the_call() {
        let (channel, router) = router();
        channel.fail.store(true, Ordering::SeqCst);

        let cell = router.invoke(None, vec![]);
        assert_eq!(cell.await, Err(CallError::Channel(ChannelError::Closed)));
        assert_eq!(router.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_closed_router_rejects_without_sending() {
        let (channel, router) = router();
        router.close("terminating");
        assert!(router.is_closed());

        let cell = router.invoke(None, vec![]);
        assert_eq!(cell.await, Err(CallError::terminated("terminating")));
        assert!(channel.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_drained_waits_for_last_call() {
        let (_channel, router) = router();
        let router = Arc::new(router);
        router.drained().await;

        router.invoke(None, vec![]);
        let waiter = tokio::spawn({
            let router = router.clone();
            async move { router.drained().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        router.on_frame(ResponseFrame::Result { id: 1, value: json!(1) });
        waiter.await.unwrap();
    }
}
