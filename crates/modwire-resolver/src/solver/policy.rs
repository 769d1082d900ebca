use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::resource::{CapabilityRef, Resource};
use crate::wiring::WiringGraph;

/// Policy for ordering candidate capabilities.
///
/// When several capabilities can satisfy a requirement, the policy
/// determines which one to try first:
/// 1. Capabilities of already resolved providers
/// 2. Higher versions (lower ones with `prefer_lowest`)
/// 3. Earlier installed providers
/// 4. Earlier declared capabilities
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Prefer lowest versions
    pub prefer_lowest: bool,
}

impl Policy {
    /// Create a new policy with default settings
    pub fn new() -> Self {
        Self { prefer_lowest: false }
    }

    /// Set preference for lowest versions
    pub fn prefer_lowest(mut self, prefer: bool) -> Self {
        self.prefer_lowest = prefer;
        self
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new().prefer_lowest(config.prefer_lowest)
    }

    /// Compare two candidates; `Less` means `a` is tried first
    pub fn compare_candidates(&self, a: &CapabilityRef, b: &CapabilityRef, baseline: &WiringGraph) -> Ordering {
        let a_resolved = baseline.contains(a.resource().id());
        let b_resolved = baseline.contains(b.resource().id());
        if a_resolved != b_resolved {
            return if a_resolved { Ordering::Less } else { Ordering::Greater };
        }

        let by_version = a.effective_version().cmp(b.effective_version());
        let by_version = if self.prefer_lowest { by_version } else { by_version.reverse() };
        if by_version != Ordering::Equal {
            return by_version;
        }

        a.resource()
            .id()
            .cmp(&b.resource().id())
            .then(a.index().cmp(&b.index()))
    }

    /// Sort candidates by preference (best first)
    pub fn sort_candidates(&self, candidates: &mut [CapabilityRef], baseline: &WiringGraph) {
        candidates.sort_by(|a, b| self.compare_candidates(a, b, baseline));
    }

    /// Order trigger resources: highest version first, then install order.
    /// Among colliding singleton triggers the highest version is tried first.
    pub fn sort_roots(&self, roots: &mut [Arc<Resource>]) {
        roots.sort_by(|a, b| b.version().cmp(a.version()).then(a.id().cmp(&b.id())));
    }
}
