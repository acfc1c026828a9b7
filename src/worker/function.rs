//! # Worker-side functions and the closure-backed implementation.
//!
//! A [`Function`] is what a worker exposes: a stable name and a call that
//! receives positional JSON arguments plus a [`CallContext`]. [`FunctionFn`]
//! wraps a closure `F: Fn(Vec<Value>, CallContext) -> Fut`, producing a fresh
//! future per call.
//!
//! ## Example
//! ```rust
//! use serde_json::{Value, json};
//! use workerbridge::{CallContext, FunctionFn, FunctionRef, SerializedError};
//!
//! let add: FunctionRef = FunctionFn::arc("add", |args: Vec<Value>, _ctx: CallContext| async move {
//!     let a = args.first().and_then(Value::as_i64).unwrap_or(0);
//!     let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
//!     Ok::<_, SerializedError>(json!(a + b))
//! });
//! assert_eq!(add.name(), "add");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::protocol::SerializedError;

use super::context::CallContext;

/// Boxed future returned by [`Function::call`].
pub type BoxCallFuture = Pin<Box<dyn Future<Output = Result<Value, SerializedError>> + Send>>;

/// Shared handle to an exposed function.
pub type FunctionRef = Arc<dyn Function>;

/// A function a worker exposes to its handle.
pub trait Function: Send + Sync + 'static {
    /// Name callers address it by.
    fn name(&self) -> &str;

    /// Starts one invocation.
    ///
    /// Implementations may report intermediate values through `ctx` and should
    /// watch `ctx.cancelled()` for worker termination.
    fn call(&self, args: Vec<Value>, ctx: CallContext) -> BoxCallFuture;
}

/// Closure-backed [`Function`].
#[derive(Debug)]
pub struct FunctionFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FunctionFn<F> {
    /// Creates a new function-backed entry.
    ///
    /// Prefer [`FunctionFn::arc`] when you immediately need a [`FunctionRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the function and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Function for FunctionFn<F>
where
    F: Fn(Vec<Value>, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, SerializedError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: Vec<Value>, ctx: CallContext) -> BoxCallFuture {
        Box::pin((self.f)(args, ctx))
    }
}
