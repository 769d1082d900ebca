use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::resource::{Resource, ResourceId};

use super::wire::Wire;

/// Wiring of a single resolved resource
#[derive(Debug, Clone)]
pub struct ResourceWiring {
    resource: Arc<Resource>,
    required: Vec<Wire>,
    provided: Vec<Wire>,
}

impl ResourceWiring {
    fn new(resource: Arc<Resource>) -> Self {
        Self {
            resource,
            required: Vec::new(),
            provided: Vec::new(),
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// Wires where this resource is the requirer, in selection order
    pub fn required_wires(&self) -> &[Wire] {
        &self.required
    }

    /// Wires where this resource is the provider
    pub fn provided_wires(&self) -> &[Wire] {
        &self.provided
    }
}

/// The committed wiring of every resolved resource.
///
/// Readers get the graph as an immutable `Arc` snapshot; writers clone it,
/// extend the clone and publish it as a whole.
#[derive(Debug, Clone, Default)]
pub struct WiringGraph {
    wirings: IndexMap<ResourceId, ResourceWiring>,
}

impl WiringGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource as committed. Existing wiring is kept.
    pub fn add_resource(&mut self, resource: Arc<Resource>) {
        self.wirings
            .entry(resource.id())
            .or_insert_with(|| ResourceWiring::new(resource));
    }

    /// Append a wire to the requirer's wires and the provider's reverse list
    pub fn add_wire(&mut self, wire: Wire) {
        let requirer = wire.requirer().clone();
        let provider = wire.provider().clone();
        self.add_resource(requirer.clone());
        self.add_resource(provider.clone());
        if let Some(wiring) = self.wirings.get_mut(&provider.id()) {
            wiring.provided.push(wire.clone());
        }
        if let Some(wiring) = self.wirings.get_mut(&requirer.id()) {
            wiring.required.push(wire);
        }
    }

    /// True when the resource is committed and each of its mandatory
    /// requirements has at least one wire
    pub fn is_resolved(&self, resource: &Resource) -> bool {
        let Some(wiring) = self.wirings.get(&resource.id()) else {
            return false;
        };
        resource
            .requirements()
            .iter()
            .filter(|r| r.is_effective() && !r.is_optional())
            .all(|r| wiring.required.iter().any(|w| w.requirement().index() == r.index()))
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.wirings.contains_key(&id)
    }

    pub fn wiring(&self, id: ResourceId) -> Option<&ResourceWiring> {
        self.wirings.get(&id)
    }

    pub fn required_wires(&self, id: ResourceId) -> &[Wire] {
        self.wirings.get(&id).map_or(&[][..], |w| w.required.as_slice())
    }

    pub fn provided_wires(&self, id: ResourceId) -> &[Wire] {
        self.wirings.get(&id).map_or(&[][..], |w| w.provided.as_slice())
    }

    /// Committed resources in commit order
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.wirings.values().map(|w| &w.resource)
    }

    pub fn len(&self) -> usize {
        self.wirings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wirings.is_empty()
    }

    /// The given resources plus every resource wired to them, directly or
    /// transitively, through reverse wires
    pub fn dependents(&self, ids: &[ResourceId]) -> IndexSet<ResourceId> {
        let mut closure: IndexSet<ResourceId> = IndexSet::new();
        let mut queue: Vec<ResourceId> = ids.iter().copied().filter(|id| self.contains(*id)).collect();

        while let Some(id) = queue.pop() {
            if !closure.insert(id) {
                continue;
            }
            for wire in self.provided_wires(id) {
                let requirer = wire.requirer().id();
                if !closure.contains(&requirer) {
                    queue.push(requirer);
                }
            }
        }

        closure
    }

    /// Remove the wiring of the given resources.
    ///
    /// Wires between removed and kept resources are dropped from the kept side too.
    pub fn remove_resources(&mut self, ids: &HashSet<ResourceId>) -> Vec<Arc<Resource>> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(wiring) = self.wirings.get(id) {
                removed.push(wiring.resource.clone());
            }
        }
        removed.sort_by_key(|r| r.id());

        self.wirings.retain(|id, _| !ids.contains(id));
        for wiring in self.wirings.values_mut() {
            wiring.provided.retain(|w| !ids.contains(&w.requirer().id()));
            wiring.required.retain(|w| !ids.contains(&w.provider().id()));
        }

        removed
    }
}
