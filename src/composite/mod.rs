//! Composite actions.
//!
//! ## Contents
//! - [`Sequence`] runs children one after another, stopping at the first error
//! - [`Parallel`] runs children concurrently, optionally aborting siblings on failure
//!
//! Both complete only after every child's done signal is set, so observers of a
//! composite's done signal never see a child still finishing.

mod parallel;
mod sequence;

pub use parallel::Parallel;
pub use sequence::Sequence;
