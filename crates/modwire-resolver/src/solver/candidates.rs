use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::Result;
use crate::hook::HookChain;
use crate::report::{Entry, ReportBuilder};
use crate::resource::{CapabilityRef, RequirementRef, Resource, ResourceId};
use crate::wiring::WiringGraph;

use super::policy::Policy;

/// Effective capabilities of every possible provider, by namespace
pub(crate) struct ProviderIndex {
    by_namespace: HashMap<String, Vec<CapabilityRef>>,
}

impl ProviderIndex {
    pub(crate) fn new<'r>(providers: impl Iterator<Item = &'r Arc<Resource>>) -> Self {
        let mut by_namespace: HashMap<String, Vec<CapabilityRef>> = HashMap::new();
        for provider in providers {
            for (index, capability) in provider.capabilities().iter().enumerate() {
                if !capability.is_effective() {
                    continue;
                }
                if let Some(cap) = CapabilityRef::new(provider.clone(), index) {
                    by_namespace.entry(capability.namespace().to_string()).or_default().push(cap);
                }
            }
        }
        Self { by_namespace }
    }

    /// Capabilities matching `requirement`, in provider install order
    pub(crate) fn matching(&self, requirement: &RequirementRef) -> Vec<CapabilityRef> {
        self.by_namespace
            .get(requirement.namespace())
            .map(|caps| caps.iter().filter(|c| requirement.matches(c)).cloned().collect())
            .unwrap_or_default()
    }
}

/// Candidate capabilities for every requirement reachable from the roots.
///
/// Computed once per resolve call. Hooks see each requirement exactly once.
pub(crate) struct CandidateSet {
    by_requirement: HashMap<(ResourceId, usize), Vec<CapabilityRef>>,
    involved: Vec<Arc<Resource>>,
}

impl CandidateSet {
    /// Walk the unresolved closure of `roots` breadth-first, computing and
    /// filtering candidates for each effective requirement
    pub(crate) fn gather(
        roots: &[Arc<Resource>],
        index: &ProviderIndex,
        baseline: &WiringGraph,
        policy: &Policy,
        hooks: &mut HookChain,
        report: &mut ReportBuilder,
    ) -> Result<Self> {
        let mut by_requirement = HashMap::new();
        let mut involved = Vec::new();
        let mut seen: HashSet<ResourceId> = HashSet::new();
        let mut queue: VecDeque<Arc<Resource>> = VecDeque::new();

        for root in roots {
            if seen.insert(root.id()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(resource) = queue.pop_front() {
            involved.push(resource.clone());

            for (i, requirement) in resource.requirements().iter().enumerate() {
                if !requirement.is_effective() {
                    continue;
                }
                let Some(req) = RequirementRef::new(resource.clone(), i) else {
                    continue;
                };

                if let Some(error) = requirement.filter_error() {
                    log::warn!("Requirement of {} has an invalid filter: {}", resource, error);
                    report.add_entry(&resource, Entry::invalid_filter(req.clone(), error.clone()));
                    by_requirement.insert(req.key(), Vec::new());
                    continue;
                }

                let mut candidates = index.matching(&req);
                hooks.filter_matches(&req, &mut candidates)?;
                policy.sort_candidates(&mut candidates, baseline);

                log::debug!("{} has {} candidate(s)", req, candidates.len());

                for candidate in &candidates {
                    let provider = candidate.resource();
                    if !baseline.contains(provider.id()) && seen.insert(provider.id()) {
                        queue.push_back(provider.clone());
                    }
                }

                by_requirement.insert(req.key(), candidates);
            }
        }

        Ok(Self {
            by_requirement,
            involved,
        })
    }

    pub(crate) fn get(&self, key: (ResourceId, usize)) -> &[CapabilityRef] {
        self.by_requirement.get(&key).map_or(&[][..], |c| c.as_slice())
    }

    /// Unresolved resources reachable from the roots, roots first
    pub(crate) fn involved(&self) -> &[Arc<Resource>] {
        &self.involved
    }

    pub(crate) fn requirement_count(&self) -> usize {
        self.by_requirement.len()
    }
}
