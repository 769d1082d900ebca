use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::hook::HookChain;
use crate::resource::{CapabilityRef, Resource, ResourceId};
use crate::wiring::WiringGraph;

use super::solver::Selection;

/// Collision sets of the singletons taking part in a resolve call.
///
/// A singleton `s` is blocked by `c` when `c` is in the collision set kept
/// for `s` after the hooks ran, and `c` is resolved or selected.
pub(crate) struct SingletonConstraints {
    kept: HashMap<ResourceId, Vec<Arc<Resource>>>,
}

impl SingletonConstraints {
    /// Compute collision sets for the singletons in `involved`.
    ///
    /// `population` holds every resource that may occupy a singleton slot:
    /// resolvable resources and everything already wired, including
    /// resources pending removal.
    pub(crate) fn compute(
        involved: &[Arc<Resource>],
        population: &[Arc<Resource>],
        hooks: &mut HookChain,
    ) -> Result<Self> {
        let mut by_name: HashMap<&str, Vec<&Arc<Resource>>> = HashMap::new();
        for resource in population.iter().filter(|r| r.is_singleton()) {
            by_name.entry(resource.symbolic_name()).or_default().push(resource);
        }

        let mut kept = HashMap::new();
        for singleton in involved.iter().filter(|r| r.is_singleton()) {
            let Some(group) = by_name.get(singleton.symbolic_name()) else {
                continue;
            };

            let mut collisions: Vec<CapabilityRef> = group
                .iter()
                .filter(|r| r.id() != singleton.id())
                .filter_map(|r| CapabilityRef::new((*r).clone(), r.identity_index()))
                .collect();
            if collisions.is_empty() {
                continue;
            }

            let Some(identity) = CapabilityRef::new(singleton.clone(), singleton.identity_index()) else {
                continue;
            };
            hooks.filter_singleton_collisions(&identity, &mut collisions)?;

            log::debug!("Singleton {} collides with {} resource(s)", singleton, collisions.len());
            kept.insert(
                singleton.id(),
                collisions.iter().map(|c| c.resource().clone()).collect(),
            );
        }

        Ok(Self { kept })
    }

    /// Resources that prevent `resource` from being selected
    pub(crate) fn blockers(&self, resource: &Resource, baseline: &WiringGraph, selected: &Selection) -> Vec<Arc<Resource>> {
        if !resource.is_singleton() {
            return Vec::new();
        }

        let mut blockers: Vec<Arc<Resource>> = Vec::new();
        let mut seen: HashSet<ResourceId> = HashSet::new();

        if let Some(collisions) = self.kept.get(&resource.id()) {
            for other in collisions {
                if (baseline.contains(other.id()) || selected.contains_key(&other.id())) && seen.insert(other.id()) {
                    blockers.push(other.clone());
                }
            }
        }

        for (id, other) in selected {
            let collides = self
                .kept
                .get(id)
                .map_or(false, |c| c.iter().any(|r| r.id() == resource.id()));
            if collides && seen.insert(*id) {
                blockers.push(other.resource.clone());
            }
        }

        blockers
    }
}
