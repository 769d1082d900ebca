//! Capability/requirement model.
//!
//! A [`Resource`] is an installed module revision. It declares
//! [`Capability`] values it offers and [`Requirement`] values it needs.
//! [`CapabilityRef`] and [`RequirementRef`] pair a declaration with its
//! owning resource so that wires, hooks and reports can name both.

mod attribute;
mod capability;
pub mod namespace;
mod requirement;
mod resource;

pub use attribute::{AttributeValue, Attributes, Directives};
pub use capability::{Capability, CapabilityRef};
pub use requirement::{Requirement, RequirementRef};
pub use resource::{Resource, ResourceBuilder, ResourceId};

/// Check whether `capability` satisfies `requirement`
pub fn matches(requirement: &Requirement, capability: &Capability) -> bool {
    requirement.matches(capability)
}
