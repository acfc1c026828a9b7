//! # WorkerHandle: calls, events and termination for one worker.
//!
//! The [`WorkerHandle`] owns the [`CallRouter`], the [`EventBus`] and the
//! channel to one worker. It wires them so that every way a worker can go away
//! ends in the same teardown.
//!
//! ## Key responsibilities
//! - expose the worker's functions as calls returning a [`ResultCell`]
//! - pump inbound channel events onto the bus and into the router
//! - cascade internal errors into rejecting every in-flight call
//! - perform graceful termination with a configurable [`Config::grace`]
//!
//! ## High-level architecture
//! ```text
//! call(method, args) ──► CallRouter.invoke ──► channel.send(CallFrame)
//!                              ▲
//! pump (spawned):              │
//!   Inbound ─► Frame(v)  ──► bus.publish(Message) ──► ResponseFrame? ──► router.on_frame
//!          ├─► Error(e)  ──► bus.publish(InternalError)
//!          └─► Exit{..}  ──► teardown("worker exited ...")
//!
//! EventBus observers (in subscription order):
//!   1. supervision: InternalError ─► teardown("internal error: ...")
//!   2. SubscriberSet ─► Subscribe impls
//!   3. user callbacks / streams
//!
//! shut(reason)  (exactly once)
//!   ├─► close router
//!   ├─► router.terminate_all(reason)   → pending cells reject Terminated
//!   └─► channel.terminate()
//! announce()  (exactly once)
//!   ├─► stop pump
//!   └─► bus.publish(Termination{reason}) → bus completes
//!
//! terminate():  shut ─► wait for Exit (≤ exit_wait) ─► announce ─► drain subscribers
//! exit / internal error / drop:  shut ─► announce
//! ```
//!
//! ## Rules
//! - Termination is published exactly once, whatever triggered it.
//! - On `terminate`, termination is published once the worker reported its exit,
//!   or when [`Config::exit_wait`] runs out.
//! - Every subscriber sees an internal error before the termination it causes.
//! - Dropping the last handle clone tears the worker down.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cell::ResultCell,
    channel::{ChannelEvent, Connection, Inbound, WorkerChannel},
    core::{Config, WorkerBuilder},
    error::{ChannelError, RuntimeError},
    events::{Event, EventBus},
    protocol::ResponseFrame,
    router::CallRouter,
    subject::Observer,
    subscribers::{Subscribe, SubscriberSet},
};

use super::proxy::{Method, RemoteFn};

struct Inner {
    cfg: Config,
    name: Arc<str>,
    router: CallRouter,
    bus: EventBus,
    channel: Arc<dyn WorkerChannel>,
    subs: Arc<SubscriberSet>,
    /// Set once shut; the reason the termination event carries.
    reason: Mutex<Option<Arc<str>>>,
    announced: AtomicBool,
    shutdown: CancellationToken,
}

impl Inner {
    fn on_frame(&self, frame: Value) {
        let parsed = ResponseFrame::from_value(&frame);
        self.bus.publish(Event::message(self.name.clone(), frame));
        match parsed {
            Ok(Some(response)) => self.router.on_frame(response),
            Ok(None) => {}
            Err(err) => self.bus.publish(Event::internal_error(
                self.name.clone(),
                ChannelError::Decode(err.to_string().into()),
            )),
        }
    }

    /// Stops accepting calls, rejects in-flight ones and asks the worker to stop.
    ///
    /// Returns `false` if the worker was already shut.
    fn shut(&self, reason: &str) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.into());
        }
        self.router.close(reason);
        let rejected = self.router.terminate_all(reason);
        self.channel.terminate();
        debug!(worker = %self.name, reason, rejected, "worker shut");
        true
    }

    /// Stops the pump and publishes the termination event, once.
    fn announce(&self) {
        if self.announced.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let reason = self
            .reason
            .lock()
            .clone()
            .unwrap_or_else(|| Arc::from("terminated"));
        debug!(worker = %self.name, reason = %reason, "termination published");
        self.bus.publish(Event::termination(self.name.clone(), reason));
    }

    fn teardown(&self, reason: &str) {
        self.shut(reason);
        self.announce();
    }

    fn is_shut(&self) -> bool {
        self.reason.lock().is_some()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown("worker handle dropped");
    }
}

/// Cascades internal errors into teardown.
struct Supervision {
    inner: Weak<Inner>,
}

impl Observer<Event, Infallible> for Supervision {
    fn on_next(&self, ev: &Event) {
        if !ev.is_internal_error() {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            let reason = match &ev.error {
                Some(err) => format!("internal error: {err}"),
                None => "internal error".to_string(),
            };
            inner.teardown(&reason);
        }
    }
}

async fn pump(inner: Weak<Inner>, mut inbound: Inbound, token: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            ev = inbound.recv() => ev,
        };
        let Some(inner) = inner.upgrade() else { break };
        match event {
            Some(ChannelEvent::Frame(frame)) => inner.on_frame(frame),
            Some(ChannelEvent::Error(err)) => {
                warn!(worker = %inner.name, error = %err, "worker channel failed");
                inner
                    .bus
                    .publish(Event::internal_error(inner.name.clone(), err));
            }
            Some(ChannelEvent::Exit { code }) => {
                let reason = match code {
                    Some(code) => format!("worker exited with code {code}"),
                    None => "worker exited".to_string(),
                };
                inner.teardown(&reason);
                break;
            }
            None => {
                inner.teardown("worker channel closed");
                break;
            }
        }
    }
}

/// Controlling-side handle to one worker.
///
/// Cheap to clone; clones share the worker. The worker is torn down when
/// [`terminate`](Self::terminate) is called, when it exits or fails, or when
/// the last clone is dropped.
///
/// ## Example
/// ```rust
/// use serde_json::{Value, json};
/// use workerbridge::{CallContext, Config, Exposed, FunctionFn, SerializedError, WorkerHandle};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let exposed = Exposed::module().with(FunctionFn::arc(
///     "greet",
///     |args: Vec<Value>, _ctx: CallContext| async move {
///         let who = args.first().and_then(Value::as_str).unwrap_or("world").to_owned();
///         Ok::<_, SerializedError>(json!(format!("hello, {who}")))
///     },
/// ));
///
/// let worker = WorkerHandle::builder(Config::named("greeter")).spawn(exposed)?;
/// let greeting = worker.call("greet", vec![json!("rust")]).await?;
/// assert_eq!(greeting, json!("hello, rust"));
///
/// worker.terminate(false).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<Inner>,
}

impl WorkerHandle {
    /// Returns a builder for configuring the handle.
    pub fn builder(cfg: Config) -> WorkerBuilder {
        WorkerBuilder::new(cfg)
    }

    /// Connects a handle with no async subscribers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(cfg: Config, connection: Connection) -> Self {
        Self::builder(cfg).connect(connection)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
        connection: Connection,
    ) -> Self {
        let Connection { channel, inbound } = connection;
        let name: Arc<str> = cfg.name.as_str().into();
        let shutdown = CancellationToken::new();

        let inner = Arc::new(Inner {
            name,
            router: CallRouter::new(Arc::clone(&channel)),
            bus: EventBus::new(),
            channel,
            subs: Arc::new(SubscriberSet::new(subscribers)),
            reason: Mutex::new(None),
            announced: AtomicBool::new(false),
            shutdown: shutdown.clone(),
            cfg,
        });

        inner.bus.subscribe(Arc::new(Supervision {
            inner: Arc::downgrade(&inner),
        }));
        inner.bus.subscribe(inner.subs.clone());

        tokio::spawn(pump(Arc::downgrade(&inner), inbound, shutdown));
        debug!(worker = %inner.name, "worker handle connected");

        Self { inner }
    }

    /// Calls a method of a module worker.
    ///
    /// Never blocks: the returned cell settles when the worker answers or goes away.
    pub fn call(&self, method: &str, args: Vec<Value>) -> ResultCell<Value> {
        self.inner.router.invoke(Some(method), args)
    }

    /// Calls the function of a single-function worker.
    pub fn call_function(&self, args: Vec<Value>) -> ResultCell<Value> {
        self.inner.router.invoke(None, args)
    }

    /// Calls a typed method descriptor.
    ///
    /// `args` encoding: a sequence (tuple, `Vec`) becomes the positional argument
    /// list, `()` becomes no arguments, anything else a single argument.
    /// Progress values and the result are decoded as `R`.
    pub fn invoke<A, R>(&self, method: &Method<A, R>, args: A) -> ResultCell<R>
    where
        A: Serialize,
        R: DeserializeOwned + Clone + Send + 'static,
    {
        let args = match super::proxy::encode_args(&args) {
            Ok(args) => args,
            Err(err) => return ResultCell::rejected(err),
        };
        self.inner
            .router
            .invoke(method.path(), args)
            .map(super::proxy::decode::<R>)
    }

    /// Returns a typed callable for a method of this worker.
    pub fn method<A, R>(&self, name: &str) -> RemoteFn<A, R> {
        RemoteFn::new(self.clone(), Method::named(name.to_owned()))
    }

    /// The worker's event bus.
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Failures the worker's channel reported, from now on; ends after termination.
    pub fn errors(&self) -> impl Stream<Item = ChannelError> + Send + 'static {
        self.inner.bus.errors()
    }

    /// The worker's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of calls awaiting an answer.
    pub fn in_flight(&self) -> usize {
        self.inner.router.in_flight()
    }

    /// True once the worker was torn down.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_shut()
    }

    /// Terminates the worker.
    ///
    /// ### Graceful (`force = false`)
    /// 1. Stop accepting calls (new calls reject as terminated)
    /// 2. Wait up to [`Config::grace`] for in-flight calls to settle
    /// 3. Tear down; on timeout the remaining calls reject and
    ///    [`RuntimeError::GraceExceeded`] is returned
    ///
    /// ### Forced (`force = true`)
    /// Tears down immediately; in-flight calls reject as terminated.
    ///
    /// In both cases the termination event is published once the worker
    /// reported its exit, or after [`Config::exit_wait`].
    /// Returns once async subscribers have handled the termination event.
    /// Calling it again (or after the worker went away) is a no-op.
    pub async fn terminate(&self, force: bool) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        let mut outcome = Ok(());

        if !force && !self.is_terminated() {
            inner.router.close("worker is terminating");
            if let Some(grace) = inner.cfg.grace_period() {
                if tokio::time::timeout(grace, inner.router.drained())
                    .await
                    .is_err()
                {
                    let stuck = inner.router.in_flight_ids();
                    warn!(worker = %inner.name, ?grace, ?stuck, "grace period exceeded");
                    outcome = Err(RuntimeError::GraceExceeded { grace, stuck });
                }
            }
        }

        let reason = match (&outcome, force) {
            (Err(_), _) => "terminated: grace period exceeded",
            (Ok(()), true) => "terminated (forced)",
            (Ok(()), false) => "terminated",
        };
        inner.shut(reason);

        if let Some(wait) = inner.cfg.exit_wait_period() {
            if tokio::time::timeout(wait, inner.bus.closed()).await.is_err() {
                warn!(worker = %inner.name, ?wait, "worker did not report its exit");
            }
        }
        inner.announce();
        inner.bus.closed().await;
        inner.subs.shutdown().await;
        outcome
    }
}
