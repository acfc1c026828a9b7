//! # Example: events
//!
//! Watches a worker's event bus while it crashes mid-call.
//!
//! Shows how to:
//! - Attach the built-in [`LogWriter`] and a custom [`Subscribe`] implementation.
//! - Read events as a stream with [`EventBus::stream`].
//! - See a crash reject the pending call as terminated.
//!
//! ## Flow
//! ```text
//! call("work") ──► worker posts a raw message ──► Message
//!              ──► worker thread panics        ──► InternalError(Crashed)
//!                                               ──► pending call rejected (Terminated)
//!                                               ──► Termination
//! ```
//!
//! ## Run
//! Requires the `logging` feature to export [`LogWriter`].
//! ```bash
//! RUST_LOG=debug cargo run --example events --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use workerbridge::{
    CallContext, ChannelEvent, Config, Connection, Event, EventKind, Exposed, FunctionFn,
    LogWriter, SerializedError, Subscribe, WorkerChannel, WorkerHandle,
};

/// Counts events by kind.
#[derive(Default)]
struct Tally {
    messages: AtomicUsize,
    errors: AtomicUsize,
}

#[async_trait]
impl Subscribe for Tally {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::Message => {
                self.messages.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::InternalError => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::Termination => {
                println!(
                    "[tally] messages={} internal_errors={}",
                    self.messages.load(Ordering::Relaxed),
                    self.errors.load(Ordering::Relaxed)
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "tally"
    }
}

/// Channel whose worker announces itself, then crashes on the first call.
struct Crashing {
    events: tokio::sync::mpsc::UnboundedSender<ChannelEvent>,
}

impl WorkerChannel for Crashing {
    fn send(&self, _frame: Value) -> Result<(), workerbridge::ChannelError> {
        let _ = self.events.send(ChannelEvent::Frame(json!({"status": "received"})));
        let _ = self.events.send(ChannelEvent::Error(workerbridge::ChannelError::Crashed(
            "segfault in native code".into(),
        )));
        let _ = self.events.send(ChannelEvent::Exit { code: None });
        Ok(())
    }

    fn terminate(&self) {}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // A healthy thread worker first: one raw message, then a result.
    let hello = FunctionFn::arc("hello", |_args: Vec<Value>, ctx: CallContext| async move {
        ctx.post_message(json!({"log": "hello called"}))?;
        Ok::<_, SerializedError>(json!("hi"))
    });
    let logger: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let worker = WorkerHandle::builder(Config::named("healthy"))
        .with_subscribers(logger)
        .spawn(Exposed::module().with(hello))?;
    println!("hello -> {}", worker.call("hello", vec![]).await?);
    worker.terminate(false).await?;

    // Then a worker that crashes while a call is pending.
    let (tx, inbound) = tokio::sync::mpsc::unbounded_channel();
    let tally = Arc::new(Tally::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), tally.clone()];
    let worker = WorkerHandle::builder(Config::named("crashing"))
        .with_subscribers(subs)
        .connect(Connection::new(Arc::new(Crashing { events: tx }), inbound));

    let mut events = worker.events().stream();
    let call = worker.call("work", vec![]);

    while let Some(ev) = events.next().await {
        println!("[stream] #{} {}", ev.seq, ev.kind.as_label());
    }
    println!("work -> {:?}", call.await);

    worker.terminate(true).await?;
    Ok(())
}
