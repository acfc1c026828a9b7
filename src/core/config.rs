//! # Worker handle configuration.
//!
//! Provides [`Config`], the settings a [`WorkerHandle`](crate::WorkerHandle) is built with.
//!
//! ## Sentinel values
//! - `grace = 0s` → no grace: graceful termination rejects in-flight calls immediately
//! - `exit_wait = 0s` → termination is announced without waiting for the worker to exit

use std::time::Duration;

/// Configuration of one worker handle.
///
/// ## Field semantics
/// - `name`: worker name (events, logs, worker thread name)
/// - `grace`: maximum wait for in-flight calls during graceful termination (`0s` = no wait)
/// - `exit_wait`: maximum wait for the worker to confirm it stopped (`0s` = no wait)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker name attached to every event the handle publishes.
    pub name: String,

    /// Maximum time `terminate(false)` waits for in-flight calls to settle.
    ///
    /// When it runs out:
    /// - remaining calls are rejected as terminated
    /// - the worker is terminated anyway
    /// - `terminate` returns `RuntimeError::GraceExceeded`
    pub grace: Duration,

    /// Maximum time `terminate` waits for the channel's exit report before
    /// publishing the termination event anyway.
    pub exit_wait: Duration,
}

impl Config {
    /// Creates a configuration with the given worker name and default grace.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the grace period as an `Option`.
    ///
    /// - `None` → no grace (terminate immediately)
    /// - `Some(d)` → wait up to `d` for in-flight calls
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns the exit wait as an `Option`; `None` means do not wait.
    #[inline]
    pub fn exit_wait_period(&self) -> Option<Duration> {
        (self.exit_wait > Duration::ZERO).then_some(self.exit_wait)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `name = "worker"`
    /// - `grace = 5s`
    /// - `exit_wait = 2s`
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            grace: Duration::from_secs(5),
            exit_wait: Duration::from_secs(2),
        }
    }
}
