//! Resolver hook protocol.
//!
//! A [`ResolverHookFactory`] is registered on the container and asked for a
//! fresh [`ResolverHook`] at the start of every resolve call. The hook is
//! called at four fixed points:
//!
//! 1. `filter_resolvable` once, with every unresolved resource
//! 2. `filter_matches` once per requirement, with its candidate capabilities
//! 3. `filter_singleton_collisions` once per singleton that has collisions
//! 4. `end` once, with the final report, whether the call succeeded or not
//!
//! Hooks may only remove items from the collections they are given.
//! Anything they add is discarded.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::{ResolverError, Result};
use crate::report::ResolutionReport;
use crate::resource::{CapabilityRef, RequirementRef, Resource};

/// Error type returned by hook implementations
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by hook implementations
pub type HookResult = std::result::Result<(), HookError>;

/// Protocol point where a hook failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    Begin,
    FilterResolvable,
    FilterMatches,
    FilterSingletonCollisions,
    End,
}

impl HookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::Begin => "begin",
            HookStage::FilterResolvable => "filterResolvable",
            HookStage::FilterMatches => "filterMatches",
            HookStage::FilterSingletonCollisions => "filterSingletonCollisions",
            HookStage::End => "end",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call resolver hook. All methods default to accepting everything.
pub trait ResolverHook {
    /// Remove resources that must not resolve in this call
    fn filter_resolvable(&mut self, _candidates: &mut Vec<Arc<Resource>>) -> HookResult {
        Ok(())
    }

    /// Remove capabilities that must not satisfy `requirement`
    fn filter_matches(&mut self, _requirement: &RequirementRef, _candidates: &mut Vec<CapabilityRef>) -> HookResult {
        Ok(())
    }

    /// Remove identity capabilities that should not count as colliding with `singleton`
    fn filter_singleton_collisions(
        &mut self,
        _singleton: &CapabilityRef,
        _collisions: &mut Vec<CapabilityRef>,
    ) -> HookResult {
        Ok(())
    }

    /// Observe the final report of the call
    fn end(&mut self, _report: &Arc<ResolutionReport>) -> HookResult {
        Ok(())
    }
}

/// Creates one hook per resolve call
pub trait ResolverHookFactory: Send + Sync {
    fn begin(&self, triggers: &[Arc<Resource>]) -> std::result::Result<Box<dyn ResolverHook>, HookError>;
}

impl<F> ResolverHookFactory for F
where
    F: Fn(&[Arc<Resource>]) -> std::result::Result<Box<dyn ResolverHook>, HookError> + Send + Sync,
{
    fn begin(&self, triggers: &[Arc<Resource>]) -> std::result::Result<Box<dyn ResolverHook>, HookError> {
        self(triggers)
    }
}

/// Handle returned when a hook factory is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookRegistration(pub(crate) u64);

/// The hooks active for one resolve call, in registration order
pub(crate) struct HookChain {
    hooks: Vec<Box<dyn ResolverHook>>,
}

impl HookChain {
    pub(crate) fn empty() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Ask every factory for its hook
    pub(crate) fn begin(factories: &[Arc<dyn ResolverHookFactory>], triggers: &[Arc<Resource>]) -> (Self, Result<()>) {
        let mut chain = Self::empty();
        for factory in factories {
            match factory.begin(triggers) {
                Ok(hook) => chain.hooks.push(hook),
                Err(e) => return (chain, Err(hook_failure(HookStage::Begin, e))),
            }
        }
        (chain, Ok(()))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn filter_resolvable(&mut self, candidates: &mut Vec<Arc<Resource>>) -> Result<()> {
        for hook in &mut self.hooks {
            let before = candidates.clone();
            hook.filter_resolvable(candidates)
                .map_err(|e| hook_failure(HookStage::FilterResolvable, e))?;
            shrink_only(HookStage::FilterResolvable, before, candidates, |r| r.id());
        }
        Ok(())
    }

    pub(crate) fn filter_matches(&mut self, requirement: &RequirementRef, candidates: &mut Vec<CapabilityRef>) -> Result<()> {
        for hook in &mut self.hooks {
            let before = candidates.clone();
            hook.filter_matches(requirement, candidates)
                .map_err(|e| hook_failure(HookStage::FilterMatches, e))?;
            shrink_only(HookStage::FilterMatches, before, candidates, |c| c.key());
        }
        Ok(())
    }

    pub(crate) fn filter_singleton_collisions(
        &mut self,
        singleton: &CapabilityRef,
        collisions: &mut Vec<CapabilityRef>,
    ) -> Result<()> {
        for hook in &mut self.hooks {
            let before = collisions.clone();
            hook.filter_singleton_collisions(singleton, collisions)
                .map_err(|e| hook_failure(HookStage::FilterSingletonCollisions, e))?;
            shrink_only(HookStage::FilterSingletonCollisions, before, collisions, |c| c.key());
        }
        Ok(())
    }

    /// Deliver the report to every hook. The first failure is returned
    /// after all hooks have seen the report.
    pub(crate) fn end(&mut self, report: &Arc<ResolutionReport>) -> Result<()> {
        let mut failure = None;
        for hook in &mut self.hooks {
            if let Err(e) = hook.end(report) {
                if failure.is_none() {
                    failure = Some(hook_failure(HookStage::End, e));
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn hook_failure(stage: HookStage, source: HookError) -> ResolverError {
    log::error!("Resolver hook failed during {}: {}", stage, source);
    ResolverError::hook(stage, source)
}

/// Restore `after` to the items of `before` it still contains, in the
/// original order. Items the hook added are dropped.
fn shrink_only<T, K, F>(stage: HookStage, before: Vec<T>, after: &mut Vec<T>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let kept: HashSet<K> = after.iter().map(&key).collect();
    let original: HashSet<K> = before.iter().map(&key).collect();
    if kept.iter().any(|k| !original.contains(k)) {
        log::warn!("Resolver hook added items during {}; additions are ignored", stage);
    }
    *after = before.into_iter().filter(|item| kept.contains(&key(item))).collect();
}
