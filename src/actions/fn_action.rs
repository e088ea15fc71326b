//! # Closure-backed action (`ActionFn`)
//!
//! [`ActionFn`] wraps a closure `F: Fn(&Context) -> Result<(), ActionError>` as a
//! natively synchronous body. The closure runs once per execution; long-running
//! closures should poll [`Context::check_abort`] to stay cancellable.
//!
//! ## Example
//! ```rust
//! use actionvisor::{ActionExt, ActionFn};
//!
//! let greet = ActionFn::arc("greet", |cx| {
//!     cx.check_abort()?;
//!     Ok(())
//! });
//!
//! greet.sync_execute().unwrap();
//! assert_eq!(greet.description(), format!("greet({})", greet.id()));
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::ActionError;

use super::bridge::{SyncAction, SyncBody};
use super::context::Context;

/// Function-backed synchronous body.
#[derive(Debug)]
pub struct ActionFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ActionFn<F>
where
    F: Fn(&Context<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
{
    /// Creates the body.
    ///
    /// Prefer [`ActionFn::arc`] when you immediately need an action.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the body and wraps it into a shared [`SyncAction`].
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<SyncAction<Self>> {
        SyncAction::new(Self::new(name, f))
    }
}

impl<F> SyncBody for ActionFn<F>
where
    F: Fn(&Context<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        (self.f)(cx)
    }
}
