use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::observer::Observer;
use super::subscription::Subscription;

/// Observer that forwards signals into an unbounded queue.
pub(crate) struct Forward<T, E> {
    tx: Mutex<Option<mpsc::UnboundedSender<Result<T, E>>>>,
}

/// Creates a forwarding observer and the receiving end of its queue.
pub(crate) fn forwarder<T, E>() -> (Arc<Forward<T, E>>, mpsc::UnboundedReceiver<Result<T, E>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(Forward {
            tx: Mutex::new(Some(tx)),
        }),
        rx,
    )
}

impl<T, E> Observer<T, E> for Forward<T, E>
where
    T: Clone + Send,
    E: Clone + Send,
{
    fn on_next(&self, value: &T) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Ok(value.clone()));
        }
    }

    fn on_error(&self, error: &E) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    fn on_complete(&self) {
        self.tx.lock().take();
    }
}

/// Stream view over a subscription.
///
/// Yields `Ok(value)` per `next`, a final `Err(error)` on `error`, and ends on
/// `complete`. Dropping it unsubscribes.
pub struct SubjectStream<T, E> {
    rx: mpsc::UnboundedReceiver<Result<T, E>>,
    subscription: Subscription,
}

impl<T, E> SubjectStream<T, E> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<T, E>>, subscription: Subscription) -> Self {
        Self { rx, subscription }
    }
}

impl<T, E> Stream for SubjectStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<T, E> Drop for SubjectStream<T, E> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
