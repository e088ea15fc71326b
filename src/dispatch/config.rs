//! # Dispatcher configuration.
//!
//! [`DispatcherConfig`] holds the settings of a [`Dispatcher`](super::Dispatcher).
//!
//! ## Field semantics
//! - `pool_size`: maximum number of root actions running at once. Must be at least 1;
//!   `0` is rejected by the builder with [`UsageError::ZeroPoolSize`].
//!
//! # Example
//! ```
//! use actionvisor::DispatcherConfig;
//!
//! let mut cfg = DispatcherConfig::default();
//! cfg.pool_size = 4;
//! assert!(cfg.validate().is_ok());
//! ```

use std::num::NonZeroUsize;
use std::thread;

use crate::error::UsageError;

/// Settings of a dispatcher.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum number of concurrently running actions.
    pub pool_size: usize,
}

impl Default for DispatcherConfig {
    /// `pool_size` = available parallelism of the machine (1 if unknown).
    fn default() -> Self {
        Self {
            pool_size: thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl DispatcherConfig {
    /// Creates a configuration with the given pool size.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.pool_size == 0 {
            return Err(UsageError::ZeroPoolSize);
        }
        Ok(())
    }
}
