//! The set of installed resources.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ResolverError, Result};
use crate::resource::{Resource, ResourceBuilder, ResourceId};

/// Installed resources in install order.
///
/// Uninstalled resources leave the universe immediately and are never
/// offered as candidates again. Those still wired stay listed as removal
/// pending until they are unresolved.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    resources: IndexMap<ResourceId, Arc<Resource>>,
    locations: HashMap<String, ResourceId>,
    removal_pending: IndexMap<ResourceId, Arc<Resource>>,
    next_id: u64,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and add a resource under a new id
    pub fn install(&mut self, location: &str, builder: ResourceBuilder) -> Result<Arc<Resource>> {
        if self.locations.contains_key(location) {
            return Err(ResolverError::DuplicateLocation {
                location: location.to_string(),
            });
        }

        let id = ResourceId(self.next_id + 1);
        let resource = Arc::new(builder.build(id, location)?);
        self.next_id += 1;

        self.locations.insert(location.to_string(), id);
        self.resources.insert(id, resource.clone());
        Ok(resource)
    }

    /// Remove a resource. When `still_wired` it is kept as removal pending.
    pub fn uninstall(&mut self, id: ResourceId, still_wired: bool) -> Result<Arc<Resource>> {
        let resource = self
            .resources
            .shift_remove(&id)
            .ok_or(ResolverError::UnknownResource(id))?;
        self.locations.remove(resource.location());
        if still_wired {
            self.removal_pending.insert(id, resource.clone());
        }
        Ok(resource)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Arc<Resource>> {
        self.resources.get(&id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    pub fn by_location(&self, location: &str) -> Option<&Arc<Resource>> {
        self.locations.get(location).and_then(|id| self.resources.get(id))
    }

    /// Installed resources in install order
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Uninstalled resources whose wiring has not been removed yet
    pub fn removal_pending(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.removal_pending.values()
    }

    pub fn is_removal_pending(&self, id: ResourceId) -> bool {
        self.removal_pending.contains_key(&id)
    }

    /// Forget removal-pending resources once their wiring is gone
    pub fn purge_removal_pending(&mut self, ids: &[ResourceId]) {
        for id in ids {
            self.removal_pending.shift_remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_assigns_increasing_ids() {
        let mut universe = Universe::new();
        let a = universe.install("file:a", ResourceBuilder::new("a", "1")).unwrap();
        let b = universe.install("file:b", ResourceBuilder::new("b", "1")).unwrap();
        assert!(a.id() < b.id());
        assert_eq!(universe.len(), 2);
        assert_eq!(universe.by_location("file:b").unwrap().id(), b.id());
    }

    #[test]
    fn test_duplicate_location() {
        let mut universe = Universe::new();
        universe.install("file:a", ResourceBuilder::new("a", "1")).unwrap();
        let err = universe.install("file:a", ResourceBuilder::new("a", "2")).unwrap_err();
        assert!(matches!(err, ResolverError::DuplicateLocation { .. }));
    }

    #[test]
    fn test_invalid_version_does_not_consume_id() {
        let mut universe = Universe::new();
        assert!(matches!(
            universe.install("file:x", ResourceBuilder::new("x", "bad")),
            Err(ResolverError::InvalidVersion(_))
        ));
        let a = universe.install("file:a", ResourceBuilder::new("a", "1")).unwrap();
        assert_eq!(a.id(), ResourceId(1));
        assert!(universe.by_location("file:x").is_none());
    }

    #[test]
    fn test_uninstall() {
        let mut universe = Universe::new();
        let a = universe.install("file:a", ResourceBuilder::new("a", "1")).unwrap();
        let b = universe.install("file:b", ResourceBuilder::new("b", "1")).unwrap();

        universe.uninstall(a.id(), true).unwrap();
        universe.uninstall(b.id(), false).unwrap();
        assert!(universe.is_empty());
        assert!(universe.is_removal_pending(a.id()));
        assert!(!universe.is_removal_pending(b.id()));
        assert!(matches!(universe.uninstall(a.id(), false), Err(ResolverError::UnknownResource(_))));

        universe.purge_removal_pending(&[a.id()]);
        assert_eq!(universe.removal_pending().count(), 0);

        // the location can be reused after uninstall
        universe.install("file:a", ResourceBuilder::new("a", "2")).unwrap();
    }
}
