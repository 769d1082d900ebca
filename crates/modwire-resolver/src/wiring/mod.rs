//! Committed wiring state.

mod delta;
mod graph;
mod wire;

pub use delta::WiringDelta;
pub use graph::{ResourceWiring, WiringGraph};
pub use wire::Wire;
