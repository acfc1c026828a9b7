use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Something a subscription can detach itself from.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Handle returned by `subscribe`.
///
/// Dropping it does **not** unsubscribe; call [`unsubscribe`](Self::unsubscribe).
/// Unsubscribing is idempotent and never fails, also after the source terminated.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    source: Option<Weak<dyn Detach>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, active: Arc<AtomicBool>, source: Weak<dyn Detach>) -> Self {
        Self {
            id,
            active,
            source: Some(source),
        }
    }

    /// A subscription that is already over (source had terminated).
    pub(crate) fn closed() -> Self {
        Self {
            id: 0,
            active: Arc::new(AtomicBool::new(false)),
            source: None,
        }
    }

    /// Stops delivery to this subscriber.
    ///
    /// Takes effect immediately, also for a fan-out pass already in progress.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(source) = self.source.as_ref().and_then(Weak::upgrade) {
            source.detach(self.id);
        }
    }

    /// True until unsubscribed or until the source delivered a terminal signal.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
