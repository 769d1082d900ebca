//! The resolve-operation coordinator.
//!
//! [`ModuleContainer`] owns the installed resources and the committed
//! wiring. Both are published as immutable `Arc` snapshots: readers clone the
//! current snapshot under a short read lock, while changes are serialized by
//! a writer mutex, computed on private copies and swapped in at the end.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use crate::config::ResolverConfig;
use crate::dependency_graph::{self, DependencyResult};
use crate::error::{ResolverError, Result};
use crate::event::{ContainerEvent, ContainerListener, EventDispatcher};
use crate::hook::{HookRegistration, ResolverHookFactory};
use crate::resource::{Resource, ResourceBuilder, ResourceId};
use crate::solver::{Policy, Resolution, Solver};
use crate::universe::Universe;
use crate::wiring::WiringGraph;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

// Containers currently changing on this thread
thread_local! {
    static ACTIVE: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a container as busy on the current thread until dropped
struct ActiveGuard {
    container: u64,
}

impl ActiveGuard {
    fn enter(container: u64) -> Result<Self> {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&container) {
                return Err(ResolverError::ReentrantResolve);
            }
            active.push(container);
            Ok(Self { container })
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.borrow_mut().retain(|c| *c != self.container));
    }
}

/// Shared module container.
///
/// All methods take `&self`; share the container between threads with an `Arc`.
pub struct ModuleContainer {
    id: u64,
    config: ResolverConfig,
    policy: Policy,
    universe: RwLock<Arc<Universe>>,
    wiring: RwLock<Arc<WiringGraph>>,
    writer: Mutex<()>,
    hooks: RwLock<Vec<(HookRegistration, Arc<dyn ResolverHookFactory>)>>,
    next_hook: AtomicU64,
    events: RwLock<EventDispatcher>,
}

impl ModuleContainer {
    /// Create a container with default configuration
    pub fn new() -> Self {
        ModuleContainerBuilder::new().build()
    }

    pub fn builder() -> ModuleContainerBuilder {
        ModuleContainerBuilder::new()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Current wiring snapshot
    pub fn wiring(&self) -> Arc<WiringGraph> {
        self.wiring.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current universe snapshot
    pub fn universe(&self) -> Arc<Universe> {
        self.universe.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Installed resources in install order
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        self.universe().resources().cloned().collect()
    }

    pub fn resource(&self, id: ResourceId) -> Option<Arc<Resource>> {
        self.universe().get(id).cloned()
    }

    pub fn is_resolved(&self, id: ResourceId) -> bool {
        self.wiring().contains(id)
    }

    /// Uninstalled resources that are still wired
    pub fn removal_pending(&self) -> Vec<Arc<Resource>> {
        self.universe().removal_pending().cloned().collect()
    }

    /// Resources wired to `id`, as a tree when `recurse` is set
    pub fn dependents(&self, id: ResourceId, recurse: bool) -> Vec<DependencyResult> {
        dependency_graph::get_dependents(&self.wiring(), &[id], recurse)
    }

    /// Register a hook factory. Its hooks take part in every later resolve call.
    pub fn register_hook_factory(&self, factory: Arc<dyn ResolverHookFactory>) -> HookRegistration {
        let registration = HookRegistration(self.next_hook.fetch_add(1, Ordering::SeqCst));
        self.hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((registration, factory));
        log::debug!("Registered resolver hook factory {}", registration.0);
        registration
    }

    /// Remove a hook factory. Returns false if it was not registered.
    pub fn unregister_hook_factory(&self, registration: HookRegistration) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let before = hooks.len();
        hooks.retain(|(r, _)| *r != registration);
        hooks.len() != before
    }

    pub fn add_listener(&self, listener: Arc<dyn ContainerListener>) {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .add_listener(listener);
    }

    /// Install a resource at `location`
    pub fn install(&self, location: &str, builder: ResourceBuilder) -> Result<Arc<Resource>> {
        let _active = ActiveGuard::enter(self.id)?;
        let _writer = self.lock_writer();

        let mut universe = Universe::clone(&self.universe());
        let resource = universe.install(location, builder)?;
        self.publish_universe(universe);

        log::debug!("Installed {} as {} from {}", resource, resource.id(), location);
        Ok(resource)
    }

    /// Uninstall a resource. A resolved resource keeps its wiring until it is
    /// unresolved and is listed as removal pending meanwhile.
    pub fn uninstall(&self, id: ResourceId) -> Result<Arc<Resource>> {
        let _active = ActiveGuard::enter(self.id)?;
        let _writer = self.lock_writer();

        let still_wired = self.wiring().contains(id);
        let mut universe = Universe::clone(&self.universe());
        let resource = universe.uninstall(id, still_wired)?;
        self.publish_universe(universe);

        log::debug!("Uninstalled {}{}", resource, if still_wired { " (removal pending)" } else { "" });
        Ok(resource)
    }

    /// Resolve the given resources.
    ///
    /// See [`Solver::solve`] for the meaning of `full`. The committed delta
    /// is returned together with the report of the call.
    pub fn resolve(&self, triggers: &[ResourceId], full: bool) -> Result<Resolution> {
        let _active = ActiveGuard::enter(self.id)?;
        let _writer = self.lock_writer();

        let universe = self.universe();
        let baseline = self.wiring();
        let triggers: Vec<Arc<Resource>> = triggers
            .iter()
            .map(|id| universe.get(*id).cloned().ok_or(ResolverError::UnknownResource(*id)))
            .collect::<Result<_>>()?;
        let factories: Vec<Arc<dyn ResolverHookFactory>> = self
            .hooks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, f)| f.clone())
            .collect();

        log::info!("Resolving {} resource(s)", triggers.len());
        let resolution = Solver::new(&universe, &baseline, &self.policy, &self.config).solve(&triggers, full, &factories)?;

        if !resolution.delta.is_empty() {
            let mut graph = WiringGraph::clone(&baseline);
            resolution.delta.apply_to(&mut graph);
            *self.wiring.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(graph);

            self.dispatch(&ContainerEvent::Resolved {
                delta: resolution.delta.clone(),
            });
        }

        Ok(resolution)
    }

    /// Remove the wiring of the given resources and of everything depending
    /// on them. Returns the resources that lost their wiring.
    pub fn unresolve(&self, ids: &[ResourceId]) -> Result<Vec<Arc<Resource>>> {
        let _active = ActiveGuard::enter(self.id)?;
        let _writer = self.lock_writer();
        let start = Instant::now();

        let universe = self.universe();
        let baseline = self.wiring();
        for id in ids {
            if !universe.contains(*id) && !baseline.contains(*id) {
                return Err(ResolverError::UnknownResource(*id));
            }
        }

        let roots: Vec<ResourceId> = ids.iter().copied().filter(|id| baseline.contains(*id)).collect();
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let mut affected: HashSet<ResourceId> = roots.iter().copied().collect();
        let dependents = dependency_graph::get_dependents(&baseline, &roots, true);
        affected.extend(dependency_graph::flatten(&dependents).iter().map(|r| r.id()));

        let mut graph = WiringGraph::clone(&baseline);
        let removed = graph.remove_resources(&affected);
        let removed_ids: Vec<ResourceId> = removed.iter().map(|r| r.id()).collect();

        let mut universe = Universe::clone(&universe);
        universe.purge_removal_pending(&removed_ids);

        *self.wiring.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(graph);
        self.publish_universe(universe);

        log::info!(
            "Unresolved {} resource(s) in {:.3} seconds",
            removed.len(),
            start.elapsed().as_secs_f64()
        );
        self.dispatch(&ContainerEvent::Unresolved {
            resources: removed.clone(),
        });

        Ok(removed)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_universe(&self, universe: Universe) {
        *self.universe.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(universe);
    }

    fn dispatch(&self, event: &ContainerEvent) {
        let dispatcher = self.events.read().unwrap_or_else(|e| e.into_inner()).clone();
        dispatcher.dispatch(event);
    }
}

impl Default for ModuleContainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating module containers.
#[derive(Default)]
pub struct ModuleContainerBuilder {
    config: Option<ResolverConfig>,
    policy: Option<Policy>,
    hook_factories: Vec<Arc<dyn ResolverHookFactory>>,
    events: EventDispatcher,
}

impl ModuleContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the candidate policy. Defaults to the one derived from the config.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn add_hook_factory(mut self, factory: Arc<dyn ResolverHookFactory>) -> Self {
        self.hook_factories.push(factory);
        self
    }

    pub fn add_listener(mut self, listener: Arc<dyn ContainerListener>) -> Self {
        self.events.add_listener(listener);
        self
    }

    pub fn build(self) -> ModuleContainer {
        let config = self.config.unwrap_or_default();
        let policy = self.policy.unwrap_or_else(|| Policy::from_config(&config));

        let container = ModuleContainer {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::SeqCst),
            config,
            policy,
            universe: RwLock::new(Arc::new(Universe::new())),
            wiring: RwLock::new(Arc::new(WiringGraph::new())),
            writer: Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
            next_hook: AtomicU64::new(1),
            events: RwLock::new(self.events),
        };
        for factory in self.hook_factories {
            container.register_hook_factory(factory);
        }
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{HookError, ResolverHook};

    #[test]
    fn test_install_and_resolve() {
        let container = ModuleContainer::new();
        let b = container
            .install("file:b", ResourceBuilder::new("b", "1.0").export_package("p", "1.0"))
            .unwrap();
        let a = container
            .install("file:a", ResourceBuilder::new("a", "1.0").import_package("p", "1.0"))
            .unwrap();

        let resolution = container.resolve(&[a.id()], false).unwrap();
        assert_eq!(resolution.delta.len(), 2);
        assert!(container.is_resolved(a.id()));
        assert!(container.is_resolved(b.id()));
        assert_eq!(container.wiring().required_wires(a.id())[0].provider().id(), b.id());
    }

    #[test]
    fn test_unknown_trigger() {
        let container = ModuleContainer::new();
        let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
        container.uninstall(a.id()).unwrap();

        assert!(matches!(
            container.resolve(&[a.id()], false),
            Err(ResolverError::UnknownResource(id)) if id == a.id()
        ));
    }

    #[test]
    fn test_snapshots_are_stable() {
        let container = ModuleContainer::new();
        let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
        let before = container.wiring();

        container.resolve(&[a.id()], false).unwrap();
        assert!(before.is_empty());
        assert_eq!(container.wiring().len(), 1);
    }

    #[test]
    fn test_uninstall_resolved_is_removal_pending() {
        let container = ModuleContainer::new();
        let b = container
            .install("file:b", ResourceBuilder::new("b", "1.0").export_package("p", "1.0"))
            .unwrap();
        let a = container
            .install("file:a", ResourceBuilder::new("a", "1.0").import_package("p", "1.0"))
            .unwrap();
        container.resolve(&[a.id()], false).unwrap();

        container.uninstall(b.id()).unwrap();
        assert_eq!(container.removal_pending()[0].id(), b.id());
        assert!(container.resource(b.id()).is_none());
        // a still uses b until it is unresolved
        assert!(container.is_resolved(a.id()));

        let removed = container.unresolve(&[b.id()]).unwrap();
        let ids: Vec<ResourceId> = removed.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
        assert!(container.removal_pending().is_empty());
        assert!(container.wiring().is_empty());
    }

    #[test]
    fn test_unresolve_not_resolved_is_noop() {
        let container = ModuleContainer::new();
        let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
        assert!(container.unresolve(&[a.id()]).unwrap().is_empty());
        assert!(matches!(
            container.unresolve(&[ResourceId(99)]),
            Err(ResolverError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_unregister_hook_factory() {
        struct HideAll;

        impl ResolverHook for HideAll {
            fn filter_resolvable(&mut self, candidates: &mut Vec<Arc<Resource>>) -> crate::hook::HookResult {
                candidates.clear();
                Ok(())
            }
        }

        let container = ModuleContainer::new();
        let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
        let registration = container.register_hook_factory(Arc::new(
            |_: &[Arc<Resource>]| -> std::result::Result<Box<dyn ResolverHook>, HookError> { Ok(Box::new(HideAll)) },
        ));

        assert!(container.resolve(&[a.id()], false).is_err());
        assert!(container.unregister_hook_factory(registration));
        assert!(!container.unregister_hook_factory(registration));
        container.resolve(&[a.id()], false).unwrap();
    }

    #[test]
    fn test_listeners_see_committed_wiring() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let container = Arc::new(
            ModuleContainer::builder()
                .add_listener(Arc::new(move |event: &ContainerEvent| {
                    recorded
                        .lock()
                        .unwrap()
                        .push((event.event_type(), event.resources().len()));
                }))
                .build(),
        );

        let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
        container.resolve(&[a.id()], false).unwrap();
        // nothing new to commit, no event
        container.resolve(&[a.id()], false).unwrap();
        container.unresolve(&[a.id()]).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(crate::event::EventType::Resolved, 1), (crate::event::EventType::Unresolved, 1)]
        );
    }

    #[test]
    fn test_builder_config_sets_policy() {
        let mut config = ResolverConfig::default();
        config.prefer_lowest = true;
        let container = ModuleContainer::builder().with_config(config).build();
        assert!(container.policy().prefer_lowest);
        assert!(container.config().prefer_lowest);
    }
}
