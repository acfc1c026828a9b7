//! # Example: basic
//!
//! Runs a module worker on its own thread and calls it three ways.
//!
//! Shows how to:
//! - Expose functions with [`FunctionFn`] and [`Exposed::module`].
//! - Await a call, iterate its progress, and call through a typed [`Method`].
//! - Observe a remote failure and an unknown method.
//! - Terminate gracefully.
//!
//! ## Flow
//! ```text
//! WorkerHandle::builder(cfg).spawn(exposed)
//!     ├─► call("add", [2, 3])            ──► Result{5}
//!     ├─► call("count", [3]).updates()   ──► Progress{1} Progress{2} Progress{3} Result{"counted 3"}
//!     ├─► invoke(&DIVIDE, (1, 0))        ──► Error{DivideByZero}
//!     └─► terminate(false)               ──► Termination
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic
//! ```

use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use workerbridge::{
    CallContext, CallError, Config, Exposed, FunctionFn, Method, SerializedError, Update,
    WorkerHandle,
};

const DIVIDE: Method<(i64, i64), i64> = Method::named_static("divide");

fn exposed() -> Exposed {
    let add = FunctionFn::arc("add", |args: Vec<Value>, _ctx: CallContext| async move {
        let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
        Ok::<_, SerializedError>(json!(sum))
    });

    let count = FunctionFn::arc("count", |args: Vec<Value>, ctx: CallContext| async move {
        let upto = args.first().and_then(Value::as_u64).unwrap_or(0);
        for i in 1..=upto {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.progress(i)?;
        }
        Ok::<_, SerializedError>(json!(format!("counted {upto}")))
    });

    let divide = FunctionFn::arc("divide", |args: Vec<Value>, _ctx: CallContext| async move {
        let a = args.first().and_then(Value::as_i64).unwrap_or(0);
        let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
        if b == 0 {
            return Err(SerializedError::new("DivideByZero", format!("{a} / 0")));
        }
        Ok(json!(a / b))
    });

    Exposed::module().with(add).with(count).with(divide)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let worker = WorkerHandle::builder(Config::named("calc")).spawn(exposed())?;

    let sum = worker.call("add", vec![json!(2), json!(3)]).await?;
    println!("add(2, 3) = {sum}");

    let mut updates = worker.call("count", vec![json!(3)]).updates();
    while let Some(update) = updates.next().await {
        match update? {
            Update::Progress(n) => println!("count progress: {n}"),
            Update::Done(msg) => println!("count done: {msg}"),
        }
    }

    match worker.invoke(&DIVIDE, (1, 0)).await {
        Err(CallError::Remote(err)) => println!("divide failed remotely: {err}"),
        other => println!("unexpected: {other:?}"),
    }

    if let Err(err) = worker.call("missing", vec![]).await {
        println!("missing: {err}");
    }

    worker.terminate(false).await?;
    println!("terminated: {}", worker.is_terminated());
    Ok(())
}
