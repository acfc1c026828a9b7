use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of one call, unique among in-flight calls of a worker.
pub type CallId = u64;

/// Kinds a [`ResponseFrame`] can carry in its `kind` tag.
const RESPONSE_KINDS: [&str; 3] = ["result", "error", "progress"];

/// Request from handle to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    /// Call identifier allocated by the router.
    pub id: CallId,
    /// Method to run; `None` addresses a worker exposing a single function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallFrame {
    /// Creates a call frame.
    pub fn new(id: CallId, function: Option<&str>, args: Vec<Value>) -> Self {
        Self {
            id,
            function: function.map(str::to_owned),
            args,
        }
    }

    /// Serializes to a JSON value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Deserializes from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Response from worker to handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseFrame {
    /// Terminal success.
    Result {
        id: CallId,
        #[serde(default)]
        value: Value,
    },

    /// Terminal failure.
    Error { id: CallId, error: SerializedError },

    /// Intermediate value; any number may precede the terminal frame.
    Progress {
        id: CallId,
        #[serde(default)]
        value: Value,
    },
}

impl ResponseFrame {
    /// Identifier of the call this frame belongs to.
    pub fn id(&self) -> CallId {
        match self {
            ResponseFrame::Result { id, .. }
            | ResponseFrame::Error { id, .. }
            | ResponseFrame::Progress { id, .. } => *id,
        }
    }

    /// True for `result` and `error` frames.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseFrame::Progress { .. })
    }

    /// Classifies an inbound value.
    ///
    /// - `Ok(None)`: not a protocol frame (no recognised `kind`), i.e. a raw message.
    /// - `Ok(Some(frame))`: a well-formed response frame.
    /// - `Err(_)`: carries a protocol `kind` but the body is malformed.
    pub fn from_value(value: &Value) -> Result<Option<Self>, serde_json::Error> {
        let is_protocol = value
            .get("kind")
            .and_then(Value::as_str)
            .is_some_and(|kind| RESPONSE_KINDS.contains(&kind));
        if !is_protocol {
            return Ok(None);
        }
        Self::deserialize(value).map(Some)
    }

    /// Serializes to a JSON value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Failure as it travels over the channel.
///
/// Any `std::error::Error` converts into it, so worker functions can use `?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    /// Error class, e.g. `"TypeError"` or `"NotFound"`.
    pub name: String,
    /// Human-readable message.
    pub message: String,
    /// Optional backtrace captured on the worker side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl SerializedError {
    /// Creates an error without a stack.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for SerializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl<E: std::error::Error> From<E> for SerializedError {
    fn from(err: E) -> Self {
        let name = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error");
        SerializedError::new(name, err.to_string())
    }
}
