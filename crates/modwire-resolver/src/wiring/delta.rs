use std::sync::Arc;

use indexmap::IndexMap;

use crate::resource::{Resource, ResourceId};

use super::graph::WiringGraph;
use super::wire::Wire;

/// Resources newly resolved by one resolve call, with their new wires
#[derive(Debug, Clone, Default)]
pub struct WiringDelta {
    entries: IndexMap<ResourceId, (Arc<Resource>, Vec<Wire>)>,
}

impl WiringDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, resource: Arc<Resource>, wires: Vec<Wire>) {
        self.entries.insert(resource.id(), (resource, wires));
    }

    /// Newly resolved resources in resolution order
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.entries.values().map(|(r, _)| r)
    }

    /// New wires of one resource
    pub fn wires(&self, id: ResourceId) -> &[Wire] {
        self.entries.get(&id).map_or(&[][..], |(_, w)| w.as_slice())
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Resource>, &[Wire])> {
        self.entries.values().map(|(r, w)| (r, w.as_slice()))
    }

    /// Total number of new wires
    pub fn wire_count(&self) -> usize {
        self.entries.values().map(|(_, w)| w.len()).sum()
    }

    /// Extend `graph` with the delta
    pub fn apply_to(&self, graph: &mut WiringGraph) {
        for (resource, _) in self.entries.values() {
            graph.add_resource(resource.clone());
        }
        for (_, wires) in self.entries.values() {
            for wire in wires {
                graph.add_wire(wire.clone());
            }
        }
    }
}
