use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelEvent;
use crate::error::ChannelError;
use crate::protocol::{CallId, ResponseFrame, SerializedError};

/// Per-invocation handle given to a worker [`Function`](super::Function).
#[derive(Clone)]
pub struct CallContext {
    id: CallId,
    out: mpsc::UnboundedSender<ChannelEvent>,
    token: CancellationToken,
}

impl CallContext {
    pub(crate) fn new(
        id: CallId,
        out: mpsc::UnboundedSender<ChannelEvent>,
        token: CancellationToken,
    ) -> Self {
        Self { id, out, token }
    }

    /// Identifier of the call being served.
    pub fn call_id(&self) -> CallId {
        self.id
    }

    /// Reports an intermediate value to the caller.
    pub fn progress(&self, value: impl Serialize) -> Result<(), SerializedError> {
        let value = serde_json::to_value(value)?;
        let frame = ResponseFrame::Progress { id: self.id, value }.to_value()?;
        self.post(frame)
    }

    /// Posts a raw, non-protocol message; it only shows up on the handle's event bus.
    pub fn post_message(&self, value: impl Serialize) -> Result<(), SerializedError> {
        let value = serde_json::to_value(value)?;
        self.post(value)
    }

    /// Resolves when the worker is being terminated.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// True once the worker is being terminated.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn post(&self, value: serde_json::Value) -> Result<(), SerializedError> {
        self.out
            .send(ChannelEvent::Frame(value))
            .map_err(|_| SerializedError::from(ChannelError::Closed))
    }
}
