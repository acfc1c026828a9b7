use std::sync::Arc;

use crate::{
    channel::{Connection, ThreadChannel},
    core::Config,
    error::ChannelError,
    subscribers::Subscribe,
    worker::Exposed,
};

use super::handle::WorkerHandle;

/// Builder for constructing a [`WorkerHandle`] with optional subscribers.
pub struct WorkerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl WorkerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets async event subscribers.
    ///
    /// Subscribers receive the worker's events (messages, internal errors,
    /// termination) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds a handle over an existing connection.
    ///
    /// Must be called from within a Tokio runtime: the handle spawns its
    /// inbound pump and the subscriber workers.
    pub fn connect(self, connection: Connection) -> WorkerHandle {
        WorkerHandle::new_internal(self.cfg, self.subscribers, connection)
    }

    /// Starts `exposed` on a dedicated [`ThreadChannel`] worker and connects to it.
    pub fn spawn(self, exposed: Exposed) -> Result<WorkerHandle, ChannelError> {
        let connection = ThreadChannel::spawn(&self.cfg.name, exposed)?;
        Ok(self.connect(connection))
    }
}
