/// Integration tests for the container's locking discipline
///
/// These tests resolve from several threads at once and call back into the
/// container from hooks and listeners.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use modwire_resolver::{
    ContainerEvent, EntryType, HookError, HookResult, ModuleContainer, Resource, ResolverError, ResolverHook,
    ResourceBuilder,
};

#[test]
fn test_concurrent_singleton_resolves() {
    let container = Arc::new(ModuleContainer::new());
    let done = AtomicBool::new(false);

    let outcomes: Vec<Result<(), EntryType>> = thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut snapshots = 0;
            while !done.load(Ordering::SeqCst) {
                let wiring = container.wiring();
                let singletons = wiring.resources().filter(|r| r.symbolic_name() == "s").count();
                assert!(singletons <= 1);
                snapshots += 1;
            }
            snapshots
        });

        let workers: Vec<_> = (1..=8)
            .map(|i| {
                let container = container.clone();
                scope.spawn(move || {
                    let s = container
                        .install(
                            &format!("file:s/{}", i),
                            ResourceBuilder::new("s", format!("{}.0", i)).singleton(true),
                        )
                        .unwrap();
                    match container.resolve(&[s.id()], false) {
                        Ok(_) => Ok(()),
                        Err(ResolverError::Resolution { report }) => Err(report.entries_for(s.id())[0].entry_type()),
                        Err(other) => panic!("unexpected error {}", other),
                    }
                })
            })
            .collect();

        let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        done.store(true, Ordering::SeqCst);
        reader.join().unwrap();
        outcomes
    });

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err().copied())
        .all(|t| t == EntryType::SingletonSelection));
    assert_eq!(container.wiring().len(), 1);
    assert_eq!(container.resources().len(), 8);
}

#[test]
fn test_concurrent_independent_resolves() {
    let container = Arc::new(ModuleContainer::new());
    let base = container
        .install("file:base", ResourceBuilder::new("base", "1.0").export_package("base", "1.0"))
        .unwrap();

    thread::scope(|scope| {
        for i in 0..8 {
            let container = container.clone();
            scope.spawn(move || {
                let app = container
                    .install(
                        &format!("file:app/{}", i),
                        ResourceBuilder::new(format!("app{}", i), "1.0").import_package("base", "1.0"),
                    )
                    .unwrap();
                container.resolve(&[app.id()], false).unwrap();
            });
        }
    });

    let wiring = container.wiring();
    assert_eq!(wiring.len(), 9);
    // base was resolved once and then reused
    assert_eq!(wiring.provided_wires(base.id()).len(), 8);
}

/// Calls back into the container from inside a resolve
struct Reentrant {
    container: Weak<ModuleContainer>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ResolverHook for Reentrant {
    fn filter_resolvable(&mut self, _: &mut Vec<Arc<Resource>>) -> HookResult {
        let Some(container) = self.container.upgrade() else {
            return Ok(());
        };
        let mut seen = self.seen.lock().unwrap();

        // reads do not block
        seen.push(format!("wiring {}", container.wiring().len()));

        for result in [
            container.resolve(&[], false).map(|_| ()),
            container.install("file:nested", ResourceBuilder::new("nested", "1.0")).map(|_| ()),
            container.unresolve(&[]).map(|_| ()),
        ] {
            match result {
                Err(ResolverError::ReentrantResolve) => seen.push("reentrant".to_string()),
                other => seen.push(format!("unexpected {:?}", other)),
            }
        }
        Ok(())
    }
}

#[test]
fn test_reentrant_calls_fail_fast() {
    let container = Arc::new(ModuleContainer::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let weak = Arc::downgrade(&container);
    let shared = seen.clone();
    container.register_hook_factory(Arc::new(
        move |_: &[Arc<Resource>]| -> Result<Box<dyn ResolverHook>, HookError> {
            Ok(Box::new(Reentrant {
                container: weak.clone(),
                seen: shared.clone(),
            }))
        },
    ));

    let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
    container.resolve(&[a.id()], false).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["wiring 0", "reentrant", "reentrant", "reentrant"]
    );
    assert!(container.universe().by_location("file:nested").is_none());
    // the guard is released afterwards
    container.resolve(&[a.id()], false).unwrap();
}

#[test]
fn test_listener_reads_committed_wiring() {
    let container = Arc::new(ModuleContainer::new());
    let weak = Arc::downgrade(&container);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shared = seen.clone();
    container.add_listener(Arc::new(move |event: &ContainerEvent| {
        if let Some(container) = weak.upgrade() {
            let resolved = event.resources().iter().all(|r| container.is_resolved(r.id()));
            shared.lock().unwrap().push(resolved);
        }
    }));

    let a = container.install("file:a", ResourceBuilder::new("a", "1.0")).unwrap();
    container.resolve(&[a.id()], false).unwrap();
    container.unresolve(&[a.id()]).unwrap();

    // resolved after the Resolved event, gone after the Unresolved one
    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
}
