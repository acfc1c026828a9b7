use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use workerbridge::{
    CallContext, CallError, ChannelError, ChannelEvent, Config, Connection, Event, EventKind,
    Exposed, FunctionFn, Method, RuntimeError, SerializedError, Subscribe, Update,
    WorkerChannel, WorkerHandle,
};

fn module() -> Exposed {
    Exposed::module()
        .with(FunctionFn::arc("add", |args: Vec<Value>, _ctx: CallContext| async move {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok::<_, SerializedError>(json!(sum))
        }))
        .with(FunctionFn::arc("count", |args: Vec<Value>, ctx: CallContext| async move {
            let upto = args.first().and_then(Value::as_u64).unwrap_or(0);
            for i in 1..=upto {
                ctx.progress(format!("{i}/{upto}"))?;
            }
            Ok::<_, SerializedError>(json!("counted"))
        }))
        .with(FunctionFn::arc("fail", |_args: Vec<Value>, _ctx: CallContext| async move {
            Err::<Value, _>(SerializedError::new("TypeError", "fail was called"))
        }))
        .with(FunctionFn::arc("sleep", |args: Vec<Value>, _ctx: CallContext| async move {
            let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, SerializedError>(json!(ms))
        }))
        .with(FunctionFn::arc("boom", |_args: Vec<Value>, _ctx: CallContext| async move {
            if true {
                panic!("boom was called");
            }
            Ok::<_, SerializedError>(Value::Null)
        }))
}

fn spawn(name: &str, grace: Duration) -> WorkerHandle {
    let mut cfg = Config::named(name);
    cfg.grace = grace;
    WorkerHandle::builder(cfg).spawn(module()).unwrap()
}

fn record(handle: &WorkerHandle) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    handle.events().subscribe_fn(move |ev| sink.lock().push(ev.clone()));
    seen
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|ev| ev.kind == kind).count()
}

#[tokio::test]
async fn call_resolves_with_remote_value() {
    let worker = spawn("calls", Duration::from_secs(1));
    assert_eq!(worker.name(), "calls");

    let sum = worker.call("add", vec![json!(2), json!(40)]).await;
    assert_eq!(sum, Ok(json!(42)));
    assert_eq!(worker.in_flight(), 0);

    worker.terminate(false).await.unwrap();
}

#[tokio::test]
async fn progress_precedes_result() {
    let worker = spawn("progress", Duration::from_secs(1));

    let updates: Vec<_> = worker
        .call("count", vec![json!(3)])
        .updates()
        .collect()
        .await;

    assert_eq!(
        updates,
        vec![
            Ok(Update::Progress(json!("1/3"))),
            Ok(Update::Progress(json!("2/3"))),
            Ok(Update::Progress(json!("3/3"))),
            Ok(Update::Done(json!("counted"))),
        ]
    );
    worker.terminate(false).await.unwrap();
}

#[tokio::test]
async fn remote_failures_stay_local_to_their_call() {
    let worker = spawn("failures", Duration::from_secs(1));

    let failed = worker.call("fail", vec![]).await;
    assert_eq!(
        failed,
        Err(CallError::Remote(SerializedError::new(
            "TypeError",
            "fail was called"
        )))
    );

    let missing = worker.call("nope", vec![]).await.unwrap_err();
    match missing {
        CallError::Remote(err) => assert_eq!(err.name, "NotFound"),
        other => panic!("unexpected error {other:?}"),
    }

    let panicked = worker.call("boom", vec![]).await.unwrap_err();
    match panicked {
        CallError::Remote(err) => {
            assert_eq!(err.name, "Panic");
            assert_eq!(err.message, "boom was called");
        }
        other => panic!("unexpected error {other:?}"),
    }

    // The worker survives all three.
    assert_eq!(worker.call("add", vec![json!(1)]).await, Ok(json!(1)));
    assert!(!worker.is_terminated());
    worker.terminate(false).await.unwrap();
}

#[tokio::test]
async fn graceful_terminate_lets_in_flight_calls_finish() {
    let worker = spawn("graceful", Duration::from_secs(5));
    let events = record(&worker);

    let slow = worker.call("sleep", vec![json!(100)]);
    worker.terminate(false).await.unwrap();

    assert_eq!(slow.outcome(), Some(Ok(json!(100))));
    assert!(worker.is_terminated());

    let events = events.lock();
    assert_eq!(count(&events, EventKind::Termination), 1);
    let last = events.last().unwrap();
    assert!(last.is_termination());
    assert_eq!(last.reason.as_deref(), Some("terminated"));
}

#[tokio::test]
async fn grace_exceeded_rejects_stuck_calls() {
    let worker = spawn("stuck", Duration::from_millis(50));

    let stuck = worker.call("sleep", vec![json!(10_000)]);
    let err = worker.terminate(false).await.unwrap_err();

    match err {
        RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(grace, Duration::from_millis(50));
            assert_eq!(stuck, vec![1]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    let rejected = stuck.await.unwrap_err();
    assert!(rejected.is_terminated());
}

#[tokio::test]
async fn forced_terminate_rejects_immediately() {
    let worker = spawn("forced", Duration::from_secs(5));

    let pending = worker.call("sleep", vec![json!(10_000)]);
    worker.terminate(true).await.unwrap();

    assert_eq!(
        pending.await,
        Err(CallError::terminated("terminated (forced)"))
    );
}

#[tokio::test]
async fn calls_after_termination_reject_without_hanging() {
    let worker = spawn("after", Duration::from_secs(1));
    worker.terminate(false).await.unwrap();

    let late = tokio::time::timeout(Duration::from_secs(1), async {
        worker.call("add", vec![]).await
    })
    .await
        .expect("a call to a terminated worker must settle");
    assert!(late.unwrap_err().is_terminated());

    // Idempotent.
    worker.terminate(true).await.unwrap();
}

#[tokio::test]
async fn typed_methods_encode_and_decode() {
    let worker = spawn("typed", Duration::from_secs(1));

    let add: Method<(i64, i64), i64> = Method::named("add");
    assert_eq!(worker.invoke(&add, (20, 22)).await, Ok(42));

    let remote = worker.method::<(i64,), String>("add");
    let wrong = remote.call((1,)).await.unwrap_err();
    assert_eq!(wrong.as_label(), "call_decode");

    worker.terminate(false).await.unwrap();
}

#[tokio::test]
async fn single_function_worker() {
    let double = FunctionFn::arc("double", |args: Vec<Value>, _ctx: CallContext| async move {
        let n = args.first().and_then(Value::as_i64).unwrap_or(0);
        Ok::<_, SerializedError>(json!(n * 2))
    });
    let worker = WorkerHandle::builder(Config::named("double"))
        .spawn(Exposed::function(double))
        .unwrap();

    assert_eq!(worker.call_function(vec![json!(21)]).await, Ok(json!(42)));
    let doubled: Method<i64, i64> = Method::function();
    assert_eq!(worker.invoke(&doubled, 8).await, Ok(16));

    worker.terminate(false).await.unwrap();
}

#[tokio::test]
async fn raw_messages_reach_the_event_stream() {
    let chatty = FunctionFn::arc("chatty", |_args: Vec<Value>, ctx: CallContext| async move {
        ctx.post_message(json!({"hello": "bus"}))?;
        Ok::<_, SerializedError>(Value::Null)
    });
    let worker = WorkerHandle::builder(Config::named("chatty"))
        .spawn(Exposed::module().with(chatty))
        .unwrap();
    let stream = worker.events().stream();

    worker.call("chatty", vec![]).await.unwrap();
    worker.terminate(false).await.unwrap();

    let events: Vec<Event> = stream.collect().await;
    let payloads: Vec<Value> = events
        .iter()
        .filter_map(|ev| ev.data.as_deref().cloned())
        .collect();
    assert_eq!(payloads[0], json!({"hello": "bus"}));
    assert_eq!(payloads[1], json!({"kind": "result", "id": 1, "value": null}));
    assert!(events.last().unwrap().is_termination());
}

/// Channel driven by the test: records sends, inbound events are pushed by hand.
/// Terminating it reports an exit, like a real worker would.
struct Scripted {
    sent: Mutex<Vec<Value>>,
    terminated: Mutex<bool>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl WorkerChannel for Scripted {
    fn send(&self, frame: Value) -> Result<(), ChannelError> {
        self.sent.lock().push(frame);
        Ok(())
    }

    fn terminate(&self) {
        *self.terminated.lock() = true;
        let _ = self.events.send(ChannelEvent::Exit { code: Some(0) });
    }
}

fn scripted_connection() -> (Arc<Scripted>, mpsc::UnboundedSender<ChannelEvent>, Connection) {
    let (tx, inbound) = mpsc::unbounded_channel();
    let channel = Arc::new(Scripted {
        sent: Mutex::new(Vec::new()),
        terminated: Mutex::new(false),
        events: tx.clone(),
    });
    let connection = Connection::new(channel.clone(), inbound);
    (channel, tx, connection)
}

fn scripted(name: &str) -> (Arc<Scripted>, mpsc::UnboundedSender<ChannelEvent>, WorkerHandle) {
    let (channel, tx, connection) = scripted_connection();
    let handle = WorkerHandle::connect(Config::named(name), connection);
    (channel, tx, handle)
}

/// Async subscriber recording event kinds.
struct Kinds(Arc<Mutex<Vec<EventKind>>>);

#[async_trait]
impl Subscribe for Kinds {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "kinds"
    }
}

#[tokio::test]
async fn internal_error_rejects_pending_calls_and_terminates_once() {
    let (channel, inbound, worker) = scripted("scripted");
    let events = record(&worker);

    let first = worker.call("a", vec![]);
    let second = worker.call("b", vec![]);
    assert_eq!(channel.sent.lock().len(), 2);

    inbound
        .send(ChannelEvent::Error(ChannelError::Crashed("boom".into())))
        .unwrap();
    inbound.send(ChannelEvent::Exit { code: None }).unwrap();

    let err = first.await.unwrap_err();
    assert!(err.is_terminated());
    assert!(second.await.unwrap_err().is_terminated());
    assert!(*channel.terminated.lock());

    let events = events.lock();
    assert_eq!(count(&events, EventKind::InternalError), 1);
    assert_eq!(count(&events, EventKind::Termination), 1);
    let kinds: Vec<_> = events.iter().map(|ev| ev.kind).collect();
    assert_eq!(kinds, vec![EventKind::InternalError, EventKind::Termination]);
    assert_eq!(
        events[1].reason.as_deref(),
        Some("internal error: worker crashed: boom")
    );
}

#[tokio::test]
async fn out_of_order_responses_settle_independently() {
    let (_channel, inbound, worker) = scripted("ordering");

    let third = worker.call("x", vec![]);
    let fourth = worker.call("y", vec![]);

    inbound
        .send(ChannelEvent::Frame(json!({"kind": "result", "id": 2, "value": "four"})))
        .unwrap();
    assert_eq!(fourth.await, Ok(json!("four")));
    assert!(third.is_pending());

    inbound
        .send(ChannelEvent::Frame(json!({"kind": "progress", "id": 99, "value": 0})))
        .unwrap();
    inbound
        .send(ChannelEvent::Frame(json!({"kind": "result", "id": 1, "value": "three"})))
        .unwrap();
    assert_eq!(third.await, Ok(json!("three")));
    assert_eq!(worker.in_flight(), 0);
    worker.terminate(true).await.unwrap();
}

#[tokio::test]
async fn malformed_protocol_frame_is_an_internal_error() {
    let (_channel, inbound, worker) = scripted("malformed");
    let events = record(&worker);
    let pending = worker.call("x", vec![]);

    inbound
        .send(ChannelEvent::Frame(json!({"kind": "result", "id": "one"})))
        .unwrap();

    assert!(pending.await.unwrap_err().is_terminated());
    let kinds: Vec<_> = events.lock().iter().map(|ev| ev.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Message, EventKind::InternalError, EventKind::Termination]
    );
}

#[tokio::test]
async fn worker_exit_terminates_the_handle() {
    let (_channel, inbound, worker) = scripted("exit");
    let stream = worker.events().stream();
    let pending = worker.call("x", vec![]);

    inbound.send(ChannelEvent::Exit { code: Some(0) }).unwrap();

    assert_eq!(
        pending.await,
        Err(CallError::terminated("worker exited with code 0"))
    );
    let events: Vec<Event> = stream.collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason.as_deref(), Some("worker exited with code 0"));
}

#[tokio::test]
async fn dropping_the_last_handle_tears_down() {
    let (channel, _inbound, worker) = scripted("dropped");
    let stream = worker.events().stream();
    let pending = worker.call("x", vec![]);

    drop(worker);

    assert_eq!(
        pending.await,
        Err(CallError::terminated("worker handle dropped"))
    );
    assert!(*channel.terminated.lock());
    let events: Vec<Event> = stream.collect().await;
    assert!(events.last().unwrap().is_termination());
}

#[tokio::test]
async fn termination_waits_for_the_worker_to_stop() {
    let finished = Arc::new(AtomicBool::new(false));
    let done = finished.clone();
    let blocking = FunctionFn::arc("block", move |_args: Vec<Value>, _ctx: CallContext| {
        let done = done.clone();
        async move {
            std::thread::sleep(Duration::from_millis(400));
            done.store(true, Ordering::SeqCst);
            Ok::<_, SerializedError>(Value::Null)
        }
    });
    let worker = WorkerHandle::builder(Config::named("blocking"))
        .spawn(Exposed::module().with(blocking))
        .unwrap();

    let stopped_at_termination = Arc::new(Mutex::new(None));
    let (flag, slot) = (finished.clone(), stopped_at_termination.clone());
    worker.events().subscribe_fn(move |ev| {
        if ev.is_termination() {
            *slot.lock() = Some(flag.load(Ordering::SeqCst));
        }
    });

    let pending = worker.call("block", vec![]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    worker.terminate(true).await.unwrap();

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(*stopped_at_termination.lock(), Some(true));
    assert!(pending.await.unwrap_err().is_terminated());
}

#[tokio::test]
async fn silent_channel_is_announced_after_exit_wait() {
    struct Silent;

    impl WorkerChannel for Silent {
        fn send(&self, _frame: Value) -> Result<(), ChannelError> {
            Ok(())
        }

        fn terminate(&self) {}
    }

    let (_tx, inbound) = mpsc::unbounded_channel();
    let mut cfg = Config::named("silent");
    cfg.exit_wait = Duration::from_millis(50);
    let worker = WorkerHandle::connect(cfg, Connection::new(Arc::new(Silent), inbound));
    let stream = worker.events().stream();

    tokio::time::timeout(Duration::from_secs(1), worker.terminate(true))
        .await
        .expect("terminate must not wait past the exit wait")
        .unwrap();

    let events: Vec<Event> = stream.collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason.as_deref(), Some("terminated (forced)"));
}

#[tokio::test]
async fn errors_stream_carries_channel_failures() {
    let (_channel, inbound, worker) = scripted("errors");
    let errors = worker.errors();

    inbound
        .send(ChannelEvent::Error(ChannelError::Crashed("boom".into())))
        .unwrap();

    let seen: Vec<ChannelError> = errors.collect().await;
    assert_eq!(seen, vec![ChannelError::Crashed("boom".into())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_subscribers_see_termination_despite_a_slow_fan_out() {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let (_channel, inbound, connection) = scripted_connection();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Kinds(kinds.clone()))];
    let worker = WorkerHandle::builder(Config::named("slow-fan-out"))
        .with_subscribers(subs)
        .connect(connection);

    let entered = Arc::new(AtomicBool::new(false));
    let flag = entered.clone();
    worker.events().subscribe_fn(move |ev| {
        if ev.is_message() {
            flag.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
        }
    });

    inbound
        .send(ChannelEvent::Frame(json!({"status": "busy"})))
        .unwrap();
    while !entered.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    worker.terminate(true).await.unwrap();

    assert_eq!(
        *kinds.lock(),
        vec![EventKind::Message, EventKind::Termination]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_publishers_share_one_order() {
    let (_channel, inbound, worker) = scripted("concurrent");
    let first = record(&worker);
    let second = record(&worker);

    let bus = worker.events().clone();
    let publisher = tokio::task::spawn_blocking(move || {
        for i in 0..100 {
            bus.publish(Event::message("concurrent", json!({"side": "bus", "n": i})));
        }
    });
    for i in 0..100 {
        inbound
            .send(ChannelEvent::Frame(json!({"side": "pump", "n": i})))
            .unwrap();
    }
    publisher.await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.terminate(true).await.unwrap();

    let first = first.lock();
    let second = second.lock();
    let seqs = |events: &[Event]| events.iter().map(|ev| ev.seq).collect::<Vec<_>>();
    assert_eq!(seqs(&first), seqs(&second));
    assert_eq!(count(&first, EventKind::Message), 200);
    assert_eq!(count(&first, EventKind::Termination), 1);
    assert!(first.last().unwrap().is_termination());
}
