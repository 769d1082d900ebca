use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::resource::{CapabilityRef, Resource, ResourceId};
use crate::wiring::WiringGraph;

/// A package reachable from one resource through two different sources
#[derive(Debug, Clone)]
pub(crate) struct UsesViolation {
    pub(crate) package: String,
    pub(crate) sources: Vec<CapabilityRef>,
}

/// Checks package-space consistency across `uses` directives.
///
/// The package space of a resource holds its imports, its exports that are
/// not also imported, and transitively every package its imported
/// capabilities use, as seen by their providers. Each package name must come
/// from exactly one capability.
pub(crate) struct UsesChecker<'a, F>
where
    F: Fn(ResourceId, usize) -> Vec<CapabilityRef>,
{
    namespaces: &'a [String],
    baseline: &'a WiringGraph,
    /// Tentative wires of resources that are not in the baseline
    tentative: F,
}

impl<'a, F> UsesChecker<'a, F>
where
    F: Fn(ResourceId, usize) -> Vec<CapabilityRef>,
{
    pub(crate) fn new(namespaces: &'a [String], baseline: &'a WiringGraph, tentative: F) -> Self {
        Self {
            namespaces,
            baseline,
            tentative,
        }
    }

    fn in_scope(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|n| n == namespace)
    }

    /// Wired package capabilities of a resource with their package names
    fn imports(&self, resource: &Arc<Resource>) -> Vec<(String, CapabilityRef)> {
        let mut imports = Vec::new();
        if self.baseline.contains(resource.id()) {
            for wire in self.baseline.required_wires(resource.id()) {
                let cap = wire.capability_ref();
                if self.in_scope(cap.namespace()) {
                    if let Some(name) = cap.name_in_namespace() {
                        imports.push((name.to_string(), cap.clone()));
                    }
                }
            }
            return imports;
        }

        for (index, requirement) in resource.requirements().iter().enumerate() {
            if !self.in_scope(requirement.namespace()) {
                continue;
            }
            for cap in (self.tentative)(resource.id(), index) {
                if let Some(name) = cap.name_in_namespace() {
                    imports.push((name.to_string(), cap.clone()));
                }
            }
        }
        imports
    }

    fn exports(&self, resource: &Arc<Resource>) -> Vec<(String, CapabilityRef)> {
        resource
            .capabilities()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_effective() && self.in_scope(c.namespace()))
            .filter_map(|(index, c)| {
                let name = c.name_in_namespace()?.to_string();
                Some((name, CapabilityRef::new(resource.clone(), index)?))
            })
            .collect()
    }

    /// Where `provider` gets package `name` from: its import, else its own export
    fn sources_of(&self, provider: &Arc<Resource>, name: &str) -> Vec<CapabilityRef> {
        let imported: Vec<CapabilityRef> = self
            .imports(provider)
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, c)| c)
            .collect();
        if !imported.is_empty() {
            return imported;
        }
        self.exports(provider)
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, c)| c)
            .collect()
    }

    /// Check one resource. Returns the first inconsistent package found.
    pub(crate) fn check(&self, resource: &Arc<Resource>) -> Option<UsesViolation> {
        let mut space: IndexMap<String, Vec<CapabilityRef>> = IndexMap::new();
        let add = |space: &mut IndexMap<String, Vec<CapabilityRef>>, name: &str, cap: &CapabilityRef| {
            let sources = space.entry(name.to_string()).or_default();
            if !sources.contains(cap) {
                sources.push(cap.clone());
            }
        };

        let imports = self.imports(resource);
        let imported: HashSet<&str> = imports.iter().map(|(n, _)| n.as_str()).collect();
        for (name, cap) in &imports {
            add(&mut space, name, cap);
        }
        for (name, cap) in self.exports(resource) {
            if !imported.contains(name.as_str()) {
                add(&mut space, &name, &cap);
            }
        }

        let mut visited: HashSet<(ResourceId, usize)> = HashSet::new();
        let mut stack: Vec<CapabilityRef> = imports.iter().map(|(_, c)| c.clone()).collect();
        while let Some(cap) = stack.pop() {
            if !visited.insert(cap.key()) {
                continue;
            }
            for used in cap.uses() {
                for source in self.sources_of(cap.resource(), &used) {
                    add(&mut space, &used, &source);
                    stack.push(source);
                }
            }
        }

        space
            .into_iter()
            .find(|(_, sources)| sources.len() > 1)
            .map(|(package, sources)| UsesViolation { package, sources })
    }
}
