use std::collections::HashMap;

use crate::protocol::SerializedError;

use super::function::FunctionRef;

/// What a worker makes callable.
///
/// - [`Exposed::function`]: a *function worker*; calls carry no function path.
/// - [`Exposed::module`] + [`Exposed::with`]: a *module worker*; calls name a method.
#[derive(Clone, Default)]
pub struct Exposed {
    single: Option<FunctionRef>,
    methods: HashMap<String, FunctionRef>,
}

impl Exposed {
    /// Exposes a single function.
    pub fn function(f: FunctionRef) -> Self {
        Self {
            single: Some(f),
            methods: HashMap::new(),
        }
    }

    /// Starts an empty module.
    pub fn module() -> Self {
        Self::default()
    }

    /// Adds a method under its [`name`](super::Function::name); a later entry
    /// with the same name replaces the earlier one.
    pub fn with(mut self, f: FunctionRef) -> Self {
        self.methods.insert(f.name().to_owned(), f);
        self
    }

    /// Sorted method names of a module worker.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Finds the function a call frame addresses.
    pub(crate) fn resolve(&self, path: Option<&str>) -> Result<FunctionRef, SerializedError> {
        match path {
            None => self.single.clone().ok_or_else(|| {
                SerializedError::new("NotFound", "worker exposes a module; a method name is required")
            }),
            Some(name) => self.methods.get(name).cloned().ok_or_else(|| {
                SerializedError::new("NotFound", format!("no method named `{name}`"))
            }),
        }
    }
}
