//! Dependency queries over committed wiring.

use std::collections::HashSet;
use std::sync::Arc;

use crate::resource::{Resource, ResourceId};
use crate::wiring::{Wire, WiringGraph};

/// A resource wired to one of the needles, and the wire that links them.
///
/// `children` holds the resources depending on `resource` in turn when the
/// query recursed. It is `None` where the tree was cut because `resource`
/// already appeared higher up.
#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub resource: Arc<Resource>,
    pub wire: Wire,
    pub children: Option<Vec<DependencyResult>>,
}

/// Find resources with wires to any of `needles`
pub fn get_dependents(graph: &WiringGraph, needles: &[ResourceId], recurse: bool) -> Vec<DependencyResult> {
    let in_tree: HashSet<ResourceId> = needles.iter().copied().collect();
    dependents_of(graph, needles, recurse, &in_tree)
}

fn dependents_of(
    graph: &WiringGraph,
    needles: &[ResourceId],
    recurse: bool,
    in_tree: &HashSet<ResourceId>,
) -> Vec<DependencyResult> {
    let mut results = Vec::new();

    for needle in needles {
        for wire in graph.provided_wires(*needle) {
            let requirer = wire.requirer();
            if requirer.id() == *needle {
                continue;
            }

            if in_tree.contains(&requirer.id()) {
                results.push(DependencyResult {
                    resource: requirer.clone(),
                    wire: wire.clone(),
                    children: None,
                });
                continue;
            }

            let children = if recurse {
                let mut in_tree = in_tree.clone();
                in_tree.insert(requirer.id());
                dependents_of(graph, &[requirer.id()], true, &in_tree)
            } else {
                Vec::new()
            };

            results.push(DependencyResult {
                resource: requirer.clone(),
                wire: wire.clone(),
                children: Some(children),
            });
        }
    }

    results
}

/// Every resource in a dependency tree, depth first
pub fn flatten(results: &[DependencyResult]) -> Vec<Arc<Resource>> {
    let mut seen = HashSet::new();
    let mut resources = Vec::new();
    let mut stack: Vec<&DependencyResult> = results.iter().rev().collect();

    while let Some(result) = stack.pop() {
        if seen.insert(result.resource.id()) {
            resources.push(result.resource.clone());
        }
        if let Some(children) = &result.children {
            stack.extend(children.iter().rev());
        }
    }

    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceBuilder;
    use crate::resource::{CapabilityRef, RequirementRef};

    fn resource(id: u64, builder: ResourceBuilder) -> Arc<Resource> {
        Arc::new(builder.build(ResourceId(id), &format!("loc{}", id)).unwrap())
    }

    /// Wire the first requirement of `requirer` to the package capability of `provider`
    fn link(graph: &mut WiringGraph, requirer: &Arc<Resource>, provider: &Arc<Resource>) {
        graph.add_resource(requirer.clone());
        graph.add_resource(provider.clone());
        let cap = provider.capabilities().len() - 1;
        graph.add_wire(Wire::new(
            RequirementRef::new(requirer.clone(), 0).unwrap(),
            CapabilityRef::new(provider.clone(), cap).unwrap(),
        ));
    }

    #[test]
    fn test_find_direct_dependent() {
        let dep = resource(1, ResourceBuilder::new("dep", "1").export_package("d", "1"));
        let app = resource(2, ResourceBuilder::new("app", "1").import_package("d", "1"));
        let mut graph = WiringGraph::new();
        link(&mut graph, &app, &dep);

        let results = get_dependents(&graph, &[dep.id()], false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource.id(), app.id());
        assert_eq!(results[0].wire.provider().id(), dep.id());
        assert!(results[0].children.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_no_dependents() {
        let dep = resource(1, ResourceBuilder::new("dep", "1"));
        let mut graph = WiringGraph::new();
        graph.add_resource(dep.clone());

        assert!(get_dependents(&graph, &[dep.id()], true).is_empty());
    }

    #[test]
    fn test_recursive_dependents() {
        let c = resource(1, ResourceBuilder::new("c", "1").export_package("c", "1"));
        let b = resource(
            2,
            ResourceBuilder::new("b", "1").import_package("c", "1").export_package("b", "1"),
        );
        let a = resource(3, ResourceBuilder::new("a", "1").import_package("b", "1"));
        let mut graph = WiringGraph::new();
        link(&mut graph, &b, &c);
        link(&mut graph, &a, &b);

        let results = get_dependents(&graph, &[c.id()], true);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource.id(), b.id());
        let children = results[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].resource.id(), a.id());

        let all: Vec<ResourceId> = flatten(&results).iter().map(|r| r.id()).collect();
        assert_eq!(all, vec![b.id(), a.id()]);
    }

    #[test]
    fn test_cycles_are_cut() {
        let a = resource(
            1,
            ResourceBuilder::new("a", "1").import_package("b", "1").export_package("a", "1"),
        );
        let b = resource(
            2,
            ResourceBuilder::new("b", "1").import_package("a", "1").export_package("b", "1"),
        );
        let mut graph = WiringGraph::new();
        link(&mut graph, &a, &b);
        link(&mut graph, &b, &a);

        let results = get_dependents(&graph, &[a.id()], true);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource.id(), b.id());
        let children = results[0].children.as_ref().unwrap();
        assert_eq!(children[0].resource.id(), a.id());
        assert!(children[0].children.is_none());
    }
}
