//! # Worker-side dispatch loop.
//!
//! Reads call frames, resolves the addressed [`Function`](super::Function) and
//! runs each invocation as its own task, posting the terminal frame when it ends.
//!
//! ```text
//! rx ── CallFrame ──► resolve(function)
//!                       ├─ miss  → Error{NotFound}
//!                       └─ hit   → spawn(call) ──► Result{value} | Error{..}
//!                                     │ panic → Error{Panic}
//!                                     └ ctx.progress(..) → Progress{..}
//! ```
//!
//! ## Rules
//! - Calls run concurrently; frames of different calls may interleave.
//! - Exactly one terminal frame is posted per served call.
//! - A frame that is not a call frame is reported as [`ChannelError::Decode`].
//! - Cancellation aborts in-flight calls; they post nothing afterwards.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::channel::ChannelEvent;
use crate::error::{ChannelError, panic_message};
use crate::protocol::{CallFrame, ResponseFrame, SerializedError};

use super::context::CallContext;
use super::expose::Exposed;

/// Serves calls until `rx` closes or `token` is cancelled.
pub(crate) async fn serve(
    exposed: Exposed,
    mut rx: mpsc::UnboundedReceiver<Value>,
    out: mpsc::UnboundedSender<ChannelEvent>,
    token: CancellationToken,
) {
    let mut calls = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            Some(_) = calls.join_next(), if !calls.is_empty() => {}

            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let frame = match CallFrame::from_value(frame) {
                    Ok(frame) => frame,
                    Err(err) => {
                        let _ = out.send(ChannelEvent::Error(ChannelError::Decode(
                            err.to_string().into(),
                        )));
                        continue;
                    }
                };
                trace!(id = frame.id, function = ?frame.function, "call received");

                let ctx = CallContext::new(frame.id, out.clone(), token.child_token());
                let out = out.clone();
                let resolved = exposed.resolve(frame.function.as_deref());
                calls.spawn(async move {
                    let id = frame.id;
                    let outcome = match resolved {
                        Ok(f) => run_call(f.call(frame.args, ctx)).await,
                        Err(err) => Err(err),
                    };
                    let response = match outcome {
                        Ok(value) => ResponseFrame::Result { id, value },
                        Err(error) => ResponseFrame::Error { id, error },
                    };
                    post(&out, response);
                });
            }
        }
    }

    if !calls.is_empty() {
        debug!(in_flight = calls.len(), "aborting in-flight calls");
    }
    calls.shutdown().await;
}

async fn run_call(
    fut: super::function::BoxCallFuture,
) -> Result<Value, SerializedError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(SerializedError::new("Panic", panic_message(&*panic))),
    }
}

fn post(out: &mpsc::UnboundedSender<ChannelEvent>, response: ResponseFrame) {
    match response.to_value() {
        Ok(frame) => {
            let _ = out.send(ChannelEvent::Frame(frame));
        }
        Err(err) => {
            let _ = out.send(ChannelEvent::Error(ChannelError::Decode(
                err.to_string().into(),
            )));
        }
    }
}
