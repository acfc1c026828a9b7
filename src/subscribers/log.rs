//! # LogWriter: event printer over `tracing`
//!
//! A minimal subscriber that logs incoming [`Event`]s. Use it for tests or demos.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! INFO  worker="resize" seq=4 data={"kind":"progress","id":1,"value":"25%"} message
//! WARN  worker="resize" seq=9 error=worker crashed: boom internal error
//! INFO  worker="resize" seq=10 reason=internal error: worker crashed: boom termination
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::Message => {
                let data = e.data.as_deref().map(ToString::to_string).unwrap_or_default();
                info!(worker = %e.worker, seq = e.seq, %data, "message");
            }
            EventKind::InternalError => {
                let error = e.error.as_ref().map(ToString::to_string).unwrap_or_default();
                warn!(worker = %e.worker, seq = e.seq, %error, "internal error");
            }
            EventKind::Termination => {
                info!(
                    worker = %e.worker,
                    seq = e.seq,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "termination"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
