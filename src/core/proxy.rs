//! # Typed proxy over a worker's dynamic call surface.
//!
//! A [`Method<A, R>`] names a remote function together with its argument type
//! `A` and result type `R`. The router stays payload-agnostic: `A` is encoded
//! to positional JSON arguments and results are decoded into `R` through
//! [`ResultCell::map`].
//!
//! ## Example
//! ```rust
//! use serde_json::{Value, json};
//! use workerbridge::{CallContext, Config, Exposed, FunctionFn, Method, SerializedError, WorkerHandle};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exposed = Exposed::module().with(FunctionFn::arc(
//!     "add",
//!     |args: Vec<Value>, _ctx: CallContext| async move {
//!         let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
//!         Ok::<_, SerializedError>(json!(sum))
//!     },
//! ));
//! let worker = WorkerHandle::builder(Config::named("math")).spawn(exposed)?;
//!
//! const ADD: Method<(i64, i64), i64> = Method::named_static("add");
//! assert_eq!(worker.invoke(&ADD, (2, 3)).await?, 5);
//!
//! let add = worker.method::<(i64, i64), i64>("add");
//! assert_eq!(add.call((40, 2)).await?, 42);
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cell::ResultCell;
use crate::error::CallError;

use super::handle::WorkerHandle;

/// Typed descriptor of a remote function.
pub struct Method<A, R> {
    path: Option<Cow<'static, str>>,
    _sig: PhantomData<fn(A) -> R>,
}

impl<A, R> Method<A, R> {
    /// A method of a module worker.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            path: Some(name.into()),
            _sig: PhantomData,
        }
    }

    /// Like [`named`](Self::named), usable in `const` items.
    pub const fn named_static(name: &'static str) -> Self {
        Self {
            path: Some(Cow::Borrowed(name)),
            _sig: PhantomData,
        }
    }

    /// The function of a single-function worker.
    pub const fn function() -> Self {
        Self {
            path: None,
            _sig: PhantomData,
        }
    }

    /// Method name; `None` for a single-function worker.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl<A, R> Clone for Method<A, R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _sig: PhantomData,
        }
    }
}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("path", &self.path).finish()
    }
}

/// A [`Method`] bound to a [`WorkerHandle`].
pub struct RemoteFn<A, R> {
    handle: WorkerHandle,
    method: Method<A, R>,
}

impl<A, R> RemoteFn<A, R> {
    pub(crate) fn new(handle: WorkerHandle, method: Method<A, R>) -> Self {
        Self { handle, method }
    }

    /// The bound method.
    pub fn method(&self) -> &Method<A, R> {
        &self.method
    }
}

impl<A, R> RemoteFn<A, R>
where
    A: Serialize,
    R: DeserializeOwned + Clone + Send + 'static,
{
    /// Issues the call; see [`WorkerHandle::invoke`].
    pub fn call(&self, args: A) -> ResultCell<R> {
        self.handle.invoke(&self.method, args)
    }
}

impl<A, R> Clone for RemoteFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            method: self.method.clone(),
        }
    }
}

/// Encodes typed arguments into the positional argument list.
pub(crate) fn encode_args<A: Serialize>(args: &A) -> Result<Vec<Value>, CallError> {
    match serde_json::to_value(args) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(single) => Ok(vec![single]),
        Err(err) => Err(CallError::Encode(err.to_string().into())),
    }
}

/// Decodes a wire value into the typed result.
pub(crate) fn decode<R: DeserializeOwned>(value: Value) -> Result<R, CallError> {
    serde_json::from_value(value).map_err(|err| CallError::Decode(err.to_string().into()))
}
