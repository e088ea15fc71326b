//! The action abstraction and its execution machinery.
//!
//! ## Contents
//! - [`Action`] object-safe trait implemented by every action; [`ActionRef`] shared handle
//! - [`ActionExt`] execution, abort, wait and ownership operations for every action
//! - [`ActionCore`] per-action state (id, ownership links, abort/done signals, counter)
//! - [`Listener`], [`Outcome`], [`Completion`] the asynchronous completion contract
//! - [`SyncAction`], [`AsyncAction`] bridges supplying the missing execution form
//! - [`ActionFn`] closure-backed synchronous action
//! - [`Context`] view of the running action handed to bodies

mod action;
mod bridge;
mod context;
mod core;
mod fn_action;
mod listener;

pub use action::{Action, ActionExt, ActionRef};
pub use bridge::{AsyncAction, AsyncBody, SyncAction, SyncBody};
pub use context::Context;
pub use self::core::{ActionCore, bind};
pub use fn_action::ActionFn;
pub use listener::{Completion, Listener, Outcome};

pub(crate) use bridge::block_on_callback;
