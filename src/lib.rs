//! # workerbridge
//!
//! **workerbridge** drives work running on worker threads through typed,
//! promise-like calls, and observes every worker through a live multi-subscriber
//! event stream.
//!
//! The hard part it owns is the call-routing and multicast core: matching
//! asynchronous, possibly streaming responses to the call that produced them,
//! broadcasting lifecycle events to any number of subscribers in one consistent
//! order, and rejecting every pending call when a worker goes away mid-call.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller                                   worker thread
//!     │ call("resize", args)                      ▲
//!     ▼                                           │ CallFrame {id, function, args}
//! ┌──────────────────────────────────────┐        │
//! │ WorkerHandle                         │        │
//! │  - CallRouter (in-flight call table) ├────────┘
//! │  - EventBus   (Subject<Event>)       │◄───────┐
//! │  - SubscriberSet (async subscribers) │        │ ResponseFrame {id, kind, ..}
//! └──────┬──────────────────────┬────────┘        │ raw messages, errors, exit
//!        ▼                      ▼                 │
//!   ResultCell<T>          Event stream     ──────┘
//!   (progress*, outcome)   (message | internal error | termination)
//! ```
//!
//! ### Call lifecycle
//! ```text
//! invoke ──► id = next_id ──► table[id] = cell ──► send(CallFrame)
//!
//! inbound frame ──► publish Message
//!   ├─ progress ──► cell.push(value)          (pending cells only)
//!   ├─ result   ──► table.remove(id) ──► cell.resolve(value)
//!   └─ error    ──► table.remove(id) ──► cell.reject(Remote(error))
//!
//! internal error / exit / terminate / last handle dropped
//!   └─► teardown (once): reject all pending (Terminated) ──► terminate channel
//!                        ──► publish Termination ──► bus completes
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Multicast**     | Synchronous broadcast with re-entrancy-safe ordering.         | [`Subject`], [`Observer`], [`Subscription`] |
//! | **Results**       | One call's progress values and single terminal outcome.       | [`ResultCell`], [`Update`]                  |
//! | **Routing**       | In-flight call table and response demultiplexing.             | [`CallRouter`]                              |
//! | **Events**        | Worker lifecycle events and async subscribers.                | [`EventBus`], [`Event`], [`Subscribe`]      |
//! | **Handles**       | Calls, typed proxies and graceful termination.                | [`WorkerHandle`], [`Method`], [`RemoteFn`]  |
//! | **Workers**       | Exposing functions and running them on a thread.              | [`Exposed`], [`FunctionFn`], [`ThreadChannel`] |
//! | **Errors**        | Typed errors for calls, channels and teardown.                | [`CallError`], [`ChannelError`], [`RuntimeError`] |
//! | **Configuration** | Per-handle settings.                                          | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use futures::StreamExt;
//! use serde_json::{Value, json};
//! use workerbridge::{CallContext, Config, Exposed, FunctionFn, SerializedError, Update, WorkerHandle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::named("thumbnails");
//!     cfg.grace = Duration::from_secs(2);
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn workerbridge::Subscribe>> = vec![Arc::new(workerbridge::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn workerbridge::Subscribe>> = Vec::new();
//!
//!     let render = FunctionFn::arc("render", |args: Vec<Value>, ctx: CallContext| async move {
//!         for pct in [25, 50, 75] {
//!             ctx.progress(format!("{pct}%"))?;
//!         }
//!         Ok::<_, SerializedError>(json!({"rendered": args.len()}))
//!     });
//!
//!     let worker = WorkerHandle::builder(cfg)
//!         .with_subscribers(subs)
//!         .spawn(Exposed::module().with(render))?;
//!
//!     let mut updates = worker.call("render", vec![json!("a.png")]).updates();
//!     while let Some(update) = updates.next().await {
//!         match update? {
//!             Update::Progress(p) => println!("progress {p}"),
//!             Update::Done(v) => println!("done {v}"),
//!         }
//!     }
//!
//!     worker.terminate(false).await?;
//!     Ok(())
//! }
//! ```

mod cell;
mod channel;
mod core;
mod error;
mod events;
mod protocol;
mod router;
mod subject;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use cell::{ResultCell, Update};
pub use channel::{ChannelEvent, Connection, Inbound, ThreadChannel, WorkerChannel};
pub use self::core::{Config, Method, RemoteFn, WorkerBuilder, WorkerHandle};
pub use error::{CallError, ChannelError, RuntimeError};
pub use events::{Event, EventBus, EventKind, EventStream};
pub use protocol::{CallFrame, CallId, ResponseFrame, SerializedError};
pub use router::CallRouter;
pub use subject::{NextFn, Observer, Subject, SubjectStream, Subscription};
pub use subscribers::{Subscribe, SubscriberSet};
pub use worker::{BoxCallFuture, CallContext, Exposed, Function, FunctionFn, FunctionRef};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
