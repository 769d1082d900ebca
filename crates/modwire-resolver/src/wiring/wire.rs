use std::fmt;
use std::sync::Arc;

use crate::resource::{Capability, CapabilityRef, Requirement, RequirementRef, Resource};

/// A directed edge from a requirement to the capability satisfying it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Wire {
    requirement: RequirementRef,
    capability: CapabilityRef,
}

impl Wire {
    pub fn new(requirement: RequirementRef, capability: CapabilityRef) -> Self {
        Self {
            requirement,
            capability,
        }
    }

    pub fn requirer(&self) -> &Arc<Resource> {
        self.requirement.resource()
    }

    pub fn provider(&self) -> &Arc<Resource> {
        self.capability.resource()
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn requirement_ref(&self) -> &RequirementRef {
        &self.requirement
    }

    pub fn capability_ref(&self) -> &CapabilityRef {
        &self.capability
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.requirement, self.capability)
    }
}
