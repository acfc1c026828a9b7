use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{ChannelError, panic_message};
use crate::worker::{Exposed, serve};

use super::channel::{ChannelEvent, Connection, WorkerChannel};

/// In-process channel running a worker on its own OS thread.
///
/// The thread owns a single-threaded tokio runtime that serves the
/// [`Exposed`] functions. The inbound queue reports:
/// - every frame the worker posts;
/// - [`ChannelError::Spawn`] if the runtime could not start;
/// - [`ChannelError::Crashed`] if the worker thread panicked;
/// - a final [`ChannelEvent::Exit`] in every case.
pub struct ThreadChannel {
    tx: mpsc::UnboundedSender<Value>,
    token: CancellationToken,
}

impl ThreadChannel {
    /// Starts a worker thread named `"{name}-worker"`.
    pub fn spawn(name: &str, exposed: Exposed) -> Result<Connection, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out, inbound) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let worker_token = token.clone();
        thread::Builder::new()
            .name(format!("{name}-worker"))
            .spawn(move || run(exposed, rx, out, worker_token))
            .map_err(|e| ChannelError::Spawn(e.to_string().into()))?;

        let channel = Arc::new(ThreadChannel { tx, token });
        Ok(Connection::new(channel, inbound))
    }
}

fn run(
    exposed: Exposed,
    rx: mpsc::UnboundedReceiver<Value>,
    out: mpsc::UnboundedSender<ChannelEvent>,
    token: CancellationToken,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "worker runtime failed to start");
            let _ = out.send(ChannelEvent::Error(ChannelError::Spawn(e.to_string().into())));
            let _ = out.send(ChannelEvent::Exit { code: Some(1) });
            return;
        }
    };

    let served = catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(serve(exposed, rx, out.clone(), token))
    }));

    let code = match served {
        Ok(()) => Some(0),
        Err(panic) => {
            let msg = panic_message(&*panic);
            error!(panic = %msg, "worker thread crashed");
            let _ = out.send(ChannelEvent::Error(ChannelError::Crashed(msg.into())));
            None
        }
    };
    debug!(?code, "worker thread exiting");
    let _ = out.send(ChannelEvent::Exit { code });
}

impl WorkerChannel for ThreadChannel {
    fn send(&self, frame: Value) -> Result<(), ChannelError> {
        if self.token.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        self.tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn terminate(&self) {
        self.token.cancel();
    }
}
