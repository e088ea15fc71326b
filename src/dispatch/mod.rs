//! Bounded dispatching of root actions.
//!
//! ## Contents
//! - [`DispatcherConfig`] settings (pool size)
//! - [`DispatcherBuilder`] adds dispatcher-level monitors, validates the settings
//! - [`Dispatcher`] runs at most `pool_size` roots at once, queueing the rest
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use actionvisor::{Dispatcher, DispatcherConfig, Pause};
//!
//! let dispatcher = Dispatcher::new(DispatcherConfig::with_pool_size(2)).unwrap();
//! for _ in 0..4 {
//!     dispatcher.dispatch(Pause::new(Duration::from_millis(5))).unwrap();
//! }
//! dispatcher.wait();
//! assert_eq!(dispatcher.running(), 0);
//! ```

mod builder;
mod config;
mod dispatcher;

pub use builder::DispatcherBuilder;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
