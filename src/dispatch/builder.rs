use std::sync::Arc;

use crate::error::UsageError;
use crate::monitors::{Monitor, MonitorSet};

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    cfg: DispatcherConfig,
    monitors: Vec<Arc<dyn Monitor>>,
}

impl DispatcherBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            monitors: Vec::new(),
        }
    }

    /// Sets monitors notified about the root actions this dispatcher runs.
    ///
    /// These come on top of the process-wide monitors, which see every action.
    pub fn with_monitors(mut self, monitors: Vec<Arc<dyn Monitor>>) -> Self {
        self.monitors = monitors;
        self
    }

    /// Validates the configuration and builds the dispatcher.
    pub fn build(self) -> Result<Dispatcher, UsageError> {
        self.cfg.validate()?;
        Ok(Dispatcher::new_internal(
            self.cfg.pool_size,
            MonitorSet::new(self.monitors),
        ))
    }
}
