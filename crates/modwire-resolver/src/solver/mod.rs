//! Backtracking resolver.
//!
//! [`Solver`] takes trigger resources, the installed [`Universe`](crate::Universe)
//! and the committed [`WiringGraph`](crate::WiringGraph) and produces a
//! [`WiringDelta`](crate::WiringDelta) for the triggers and whatever they pull in.

mod candidates;
mod policy;
mod singleton;
#[allow(clippy::module_inception)]
mod solver;
mod uses;


pub use policy::Policy;
pub use solver::{Resolution, Solver};
