use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::hook::{HookChain, ResolverHookFactory};
use crate::report::{Entry, ReportBuilder, ResolutionReport};
use crate::resource::{CapabilityRef, RequirementRef, Resource, ResourceId};
use crate::universe::Universe;
use crate::wiring::{Wire, WiringDelta, WiringGraph};

use super::candidates::{CandidateSet, ProviderIndex};
use super::policy::Policy;
use super::singleton::SingletonConstraints;
use super::uses::UsesChecker;

/// A resource selected during the search, tagged with the root being
/// processed when it was selected
#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub(crate) resource: Arc<Resource>,
    pub(crate) root: usize,
    /// Choice points whose decisions pulled the resource in. Empty for
    /// roots and everything they force.
    pub(crate) reasons: Conflict,
}

/// Ids of the choice points a conflict depends on. An empty set means no
/// other decision can avoid the conflict.
pub(crate) type Conflict = BTreeSet<u64>;

/// Resources selected so far, in selection order
pub(crate) type Selection = IndexMap<ResourceId, Selected>;

/// Result of a successful resolve call
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Newly resolved resources and their wires
    pub delta: WiringDelta,
    /// Entries recorded during the call, including those of dropped triggers
    pub report: Arc<ResolutionReport>,
}

/// The backtracking resolver.
///
/// Computes wires for a set of trigger resources against a read-only
/// baseline wiring. The solver never mutates the baseline; committing the
/// returned delta is up to the caller.
pub struct Solver<'a> {
    /// Installed resources
    universe: &'a Universe,
    /// Already committed wiring
    baseline: &'a WiringGraph,
    /// Candidate ordering
    policy: &'a Policy,
    config: &'a ResolverConfig,
}

impl<'a> Solver<'a> {
    /// Create a new solver
    pub fn new(universe: &'a Universe, baseline: &'a WiringGraph, policy: &'a Policy, config: &'a ResolverConfig) -> Self {
        Self {
            universe,
            baseline,
            policy,
            config,
        }
    }

    /// Resolve `triggers`, running the hook protocol of `factories`.
    ///
    /// With `full` set, triggers that cannot resolve are dropped one at a
    /// time and the rest retried; otherwise any failing trigger fails the
    /// whole call with [`ResolverError::Resolution`].
    pub fn solve(
        &self,
        triggers: &[Arc<Resource>],
        full: bool,
        factories: &[Arc<dyn ResolverHookFactory>],
    ) -> Result<Resolution> {
        let start = Instant::now();
        let (mut hooks, begun) = HookChain::begin(factories, triggers);
        let mut report = ReportBuilder::new();
        log::debug!(
            "Resolving {} trigger(s){}",
            triggers.len(),
            if hooks.is_empty() { "" } else { " with resolver hooks" }
        );

        let outcome = begun.and_then(|_| self.run(triggers, full, &mut hooks, &mut report));

        let mut resolved: HashSet<ResourceId> = self.baseline.resources().map(|r| r.id()).collect();
        if let Ok(Some(delta)) = &outcome {
            resolved.extend(delta.resources().map(|r| r.id()));
        }
        report.remove_blocking(&resolved);
        let report = Arc::new(report.build());

        let ended = hooks.end(&report);

        match outcome {
            Err(e) => Err(e),
            Ok(None) => {
                ended?;
                log::info!("Resolution failed in {:.3} seconds", start.elapsed().as_secs_f64());
                Err(ResolverError::Resolution { report })
            }
            Ok(Some(delta)) => {
                ended?;
                log::info!(
                    "Resolved {} resource(s) with {} wire(s) in {:.3} seconds",
                    delta.len(),
                    delta.wire_count(),
                    start.elapsed().as_secs_f64()
                );
                Ok(Resolution { delta, report })
            }
        }
    }

    /// Run the attempt. `Ok(None)` means the triggers cannot be resolved.
    fn run(
        &self,
        triggers: &[Arc<Resource>],
        full: bool,
        hooks: &mut HookChain,
        report: &mut ReportBuilder,
    ) -> Result<Option<WiringDelta>> {
        let mut resolvable: Vec<Arc<Resource>> = self
            .universe
            .resources()
            .filter(|r| !self.baseline.contains(r.id()))
            .cloned()
            .collect();
        hooks.filter_resolvable(&mut resolvable)?;
        let resolvable_ids: HashSet<ResourceId> = resolvable.iter().map(|r| r.id()).collect();

        let mut roots: Vec<Arc<Resource>> = Vec::new();
        let mut filtered = false;
        for trigger in triggers {
            if self.baseline.contains(trigger.id()) || roots.iter().any(|r| r.id() == trigger.id()) {
                continue;
            }
            if !resolvable_ids.contains(&trigger.id()) {
                log::debug!("{} was filtered out by a resolver hook", trigger);
                report.add_entry(trigger, Entry::filtered_by_resolver_hook());
                filtered = true;
                continue;
            }
            roots.push(trigger.clone());
        }

        if filtered && !full {
            return Ok(None);
        }
        if roots.is_empty() {
            return Ok(Some(WiringDelta::new()));
        }
        self.policy.sort_roots(&mut roots);

        let providers = ProviderIndex::new(
            self.universe
                .resources()
                .filter(|r| self.baseline.contains(r.id()) || resolvable_ids.contains(&r.id())),
        );

        log::debug!("Gathering candidates for {} trigger(s)", roots.len());
        let candidates = CandidateSet::gather(&roots, &providers, self.baseline, self.policy, hooks, report)?;
        log::debug!(
            "Found {} unresolved resource(s) and {} requirement(s) to wire",
            candidates.involved().len(),
            candidates.requirement_count()
        );

        let mut population: Vec<Arc<Resource>> = resolvable.clone();
        population.extend(self.baseline.resources().cloned());
        population.sort_by_key(|r| r.id());
        let singletons = SingletonConstraints::compute(candidates.involved(), &population, hooks)?;

        let mut iterations: u64 = 0;
        loop {
            let search = Search::new(self, &candidates, &singletons, &roots);
            match search.run(&mut iterations, report)? {
                Round::Solved(delta) => return Ok(Some(delta)),
                Round::Failed { failing_root } => {
                    if !full {
                        return Ok(None);
                    }
                    let dropped = roots.remove(failing_root.min(roots.len() - 1));
                    log::info!("Dropping {} from the trigger set and retrying", dropped);
                    if roots.is_empty() {
                        return Ok(Some(WiringDelta::new()));
                    }
                }
            }
        }
    }
}

/// Outcome of one search round over a fixed root set
enum Round {
    Solved(WiringDelta),
    Failed { failing_root: usize },
}

/// Outcome of one search step
enum Step {
    Continue,
    Conflict(Conflict),
}

#[derive(Clone)]
enum Task {
    /// Add a resource to the selection and queue its requirements
    Resolve(Arc<Resource>),
    /// Pick a provider for a requirement
    Require(RequirementRef),
}

enum TrailItem {
    Selected(ResourceId),
    Decided((ResourceId, usize)),
}

/// The alternative a choice point settled on for its requirement
struct Decision {
    choice: u64,
    /// `None` when an optional requirement was left unwired
    capability: Option<CapabilityRef>,
}

/// A requirement with alternatives left to try, plus the state to restore
/// before trying them
struct ChoicePoint {
    id: u64,
    requirement: RequirementRef,
    /// Choice points the requirement's owner depends on
    owner_reasons: Conflict,
    /// Earlier choice points blamed by the alternatives that failed so far
    conflicts: Conflict,
    /// Next candidate index. For optional requirements the index equal to
    /// the candidate count stands for leaving the requirement unwired.
    next: usize,
    trail_len: usize,
    agenda_len: usize,
    cursor: usize,
    root_index: usize,
}

/// State of one search round.
///
/// Roots are processed one at a time; the requirements reachable from a
/// root are handled breadth-first through the agenda. Every conflict names
/// the choice points it depends on, and the search jumps straight back to
/// the newest of them, skipping choices that had no part in it. A conflict
/// that depends on no choice fails the round at once.
struct Search<'s> {
    baseline: &'s WiringGraph,
    config: &'s ResolverConfig,
    candidates: &'s CandidateSet,
    singletons: &'s SingletonConstraints,
    roots: &'s [Arc<Resource>],
    selected: Selection,
    decisions: IndexMap<(ResourceId, usize), Decision>,
    trail: Vec<TrailItem>,
    agenda: Vec<Task>,
    cursor: usize,
    root_index: usize,
    choices: Vec<ChoicePoint>,
    next_choice: u64,
    /// Highest root index at which a conflict occurred
    failing_root: usize,
}

impl<'s> Search<'s> {
    fn new(
        solver: &'s Solver<'_>,
        candidates: &'s CandidateSet,
        singletons: &'s SingletonConstraints,
        roots: &'s [Arc<Resource>],
    ) -> Self {
        Self {
            baseline: solver.baseline,
            config: solver.config,
            candidates,
            singletons,
            roots,
            selected: IndexMap::new(),
            decisions: IndexMap::new(),
            trail: Vec::new(),
            agenda: Vec::new(),
            cursor: 0,
            root_index: 0,
            choices: Vec::new(),
            next_choice: 0,
            failing_root: 0,
        }
    }

    fn run(mut self, iterations: &mut u64, report: &mut ReportBuilder) -> Result<Round> {
        let Some(first) = self.roots.first() else {
            return Ok(Round::Solved(WiringDelta::new()));
        };
        self.agenda.push(Task::Resolve(first.clone()));

        loop {
            if self.cursor < self.agenda.len() {
                let task = self.agenda[self.cursor].clone();
                self.cursor += 1;

                let step = match task {
                    Task::Resolve(resource) => self.resolve_resource(&resource, report),
                    Task::Require(requirement) => self.require(requirement, iterations, report)?,
                };
                if let Step::Conflict(conflict) = step {
                    self.note_conflict(self.root_index);
                    if !self.backjump(conflict, iterations, report)? {
                        return Ok(Round::Failed {
                            failing_root: self.failing_root,
                        });
                    }
                }
            } else if self.root_index + 1 < self.roots.len() {
                self.root_index += 1;
                self.agenda.push(Task::Resolve(self.roots[self.root_index].clone()));
            } else {
                match self.find_uses_violation() {
                    None => return Ok(Round::Solved(self.into_delta())),
                    Some((resource, violation)) => {
                        log::debug!("Uses constraint violation in {} for package {}", resource, violation.package);
                        let conflict_root = violation
                            .sources
                            .iter()
                            .filter_map(|s| self.selected.get(&s.resource().id()).map(|sel| sel.root))
                            .chain(self.selected.get(&resource.id()).map(|sel| sel.root))
                            .max()
                            .unwrap_or(self.root_index);
                        let conflict = self.uses_conflict(&resource, &violation.package);
                        report.add_entry(
                            &resource,
                            Entry::uses_constraint_violation(violation.package, violation.sources),
                        );
                        self.note_conflict(conflict_root);
                        if !self.backjump(conflict, iterations, report)? {
                            return Ok(Round::Failed {
                                failing_root: self.failing_root,
                            });
                        }
                    }
                }
            }
        }
    }

    fn note_conflict(&mut self, root: usize) {
        self.failing_root = self.failing_root.max(root);
    }

    fn is_available(&self, id: ResourceId) -> bool {
        self.baseline.contains(id) || self.selected.contains_key(&id)
    }

    fn reasons_of(&self, id: ResourceId) -> Conflict {
        self.selected.get(&id).map(|sel| sel.reasons.clone()).unwrap_or_default()
    }

    fn wired(&self, key: (ResourceId, usize)) -> Option<&CapabilityRef> {
        self.decisions.get(&key).and_then(|d| d.capability.as_ref())
    }

    fn resolve_resource(&mut self, resource: &Arc<Resource>, report: &mut ReportBuilder) -> Step {
        if self.is_available(resource.id()) {
            return Step::Continue;
        }
        self.select(resource, Conflict::new(), report)
    }

    /// Add a resource to the selection unless a singleton collision forbids it
    fn select(&mut self, resource: &Arc<Resource>, reasons: Conflict, report: &mut ReportBuilder) -> Step {
        let blockers = self.singletons.blockers(resource, self.baseline, &self.selected);
        if !blockers.is_empty() {
            log::debug!("{} is blocked by singleton {}", resource, blockers[0]);
            // blockers in the baseline cannot be undone
            let conflict: Conflict = blockers
                .iter()
                .filter_map(|b| self.selected.get(&b.id()))
                .flat_map(|sel| sel.reasons.iter().copied())
                .collect();
            report.add_entry(resource, Entry::singleton_selection(blockers));
            return Step::Conflict(conflict);
        }

        log::debug!("Selecting {}", resource);
        self.selected.insert(
            resource.id(),
            Selected {
                resource: resource.clone(),
                root: self.root_index,
                reasons,
            },
        );
        self.trail.push(TrailItem::Selected(resource.id()));

        for (index, requirement) in resource.requirements().iter().enumerate() {
            if !requirement.is_effective() {
                continue;
            }
            if let Some(req) = RequirementRef::new(resource.clone(), index) {
                self.agenda.push(Task::Require(req));
            }
        }
        Step::Continue
    }

    fn require(
        &mut self,
        requirement: RequirementRef,
        iterations: &mut u64,
        report: &mut ReportBuilder,
    ) -> Result<Step> {
        let owner_reasons = self.reasons_of(requirement.resource().id());

        if self.candidates.get(requirement.key()).is_empty() {
            if requirement.is_optional() {
                return Ok(Step::Continue);
            }
            report.add_entry(requirement.resource(), Entry::missing_capability(requirement.clone()));
            return Ok(Step::Conflict(owner_reasons));
        }

        let id = self.next_choice;
        self.next_choice += 1;
        self.choices.push(ChoicePoint {
            id,
            requirement,
            owner_reasons,
            conflicts: Conflict::new(),
            next: 0,
            trail_len: self.trail.len(),
            agenda_len: self.agenda.len(),
            cursor: self.cursor,
            root_index: self.root_index,
        });
        self.advance(iterations, report)
    }

    /// Try the remaining alternatives of the newest choice point.
    /// Pops the choice point when none is left and returns its conflict.
    fn advance(&mut self, iterations: &mut u64, report: &mut ReportBuilder) -> Result<Step> {
        let Some(top) = self.choices.len().checked_sub(1) else {
            return Ok(Step::Conflict(Conflict::new()));
        };
        let choice = self.choices[top].id;
        let requirement = self.choices[top].requirement.clone();
        let mut reasons = self.choices[top].owner_reasons.clone();
        reasons.insert(choice);
        let set: &'s CandidateSet = self.candidates;
        let candidates = set.get(requirement.key());

        loop {
            let next = self.choices[top].next;
            if next > candidates.len() || (next == candidates.len() && !requirement.is_optional()) {
                break;
            }
            self.choices[top].next += 1;
            self.tick(iterations)?;

            if next == candidates.len() {
                log::debug!("Leaving optional {} unwired", requirement);
                self.decide(&requirement, choice, None);
                return Ok(Step::Continue);
            }

            match self.try_candidate(&requirement, choice, &candidates[next], &reasons, report) {
                Step::Continue => return Ok(Step::Continue),
                Step::Conflict(mut conflict) => {
                    conflict.remove(&choice);
                    self.choices[top].conflicts.extend(conflict);
                }
            }
        }

        if self.config.report_unresolved_providers {
            report.add_entry(
                requirement.resource(),
                Entry::unresolved_provider(requirement.clone(), candidates.to_vec()),
            );
        }
        let conflict = match self.choices.pop() {
            Some(exhausted) => exhausted.conflicts.union(&exhausted.owner_reasons).copied().collect(),
            None => Conflict::new(),
        };
        Ok(Step::Conflict(conflict))
    }

    fn try_candidate(
        &mut self,
        requirement: &RequirementRef,
        choice: u64,
        candidate: &CapabilityRef,
        reasons: &Conflict,
        report: &mut ReportBuilder,
    ) -> Step {
        let provider = candidate.resource();
        if !self.is_available(provider.id()) {
            if let Step::Conflict(conflict) = self.select(provider, reasons.clone(), report) {
                return Step::Conflict(conflict);
            }
        }

        log::debug!("Wiring {} to {}", requirement, candidate);
        self.decide(requirement, choice, Some(candidate.clone()));
        Step::Continue
    }

    fn decide(&mut self, requirement: &RequirementRef, choice: u64, capability: Option<CapabilityRef>) {
        self.decisions.insert(requirement.key(), Decision { choice, capability });
        self.trail.push(TrailItem::Decided(requirement.key()));
    }

    fn tick(&self, iterations: &mut u64) -> Result<()> {
        *iterations += 1;
        if *iterations > self.config.max_iterations {
            log::warn!("Giving up after {} candidate attempts", self.config.max_iterations);
            return Err(ResolverError::SearchLimitExceeded {
                limit: self.config.max_iterations,
            });
        }
        Ok(())
    }

    /// Resume the newest choice point blamed by `conflict`, dropping the
    /// newer ones untried. Returns false when no blamed choice has
    /// alternatives left.
    fn backjump(&mut self, mut conflict: Conflict, iterations: &mut u64, report: &mut ReportBuilder) -> Result<bool> {
        loop {
            let Some(target) = conflict.last().copied() else {
                return Ok(false);
            };
            while self.choices.last().map_or(false, |c| c.id > target) {
                self.choices.pop();
            }
            conflict.remove(&target);
            let Some(choice) = self.choices.last_mut().filter(|c| c.id == target) else {
                continue;
            };
            choice.conflicts.extend(conflict);
            let (trail_len, agenda_len, cursor, root_index) =
                (choice.trail_len, choice.agenda_len, choice.cursor, choice.root_index);

            log::debug!("Backjumping to {}", choice.requirement);
            self.undo_to(trail_len);
            self.agenda.truncate(agenda_len);
            self.cursor = cursor;
            self.root_index = root_index;

            match self.advance(iterations, report)? {
                Step::Continue => return Ok(true),
                Step::Conflict(next) => conflict = next,
            }
        }
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            match self.trail.pop() {
                Some(TrailItem::Selected(id)) => {
                    self.selected.shift_remove(&id);
                }
                Some(TrailItem::Decided(key)) => {
                    self.decisions.shift_remove(&key);
                }
                None => break,
            }
        }
    }

    fn find_uses_violation(&self) -> Option<(Arc<Resource>, super::uses::UsesViolation)> {
        if !self.config.check_uses {
            return None;
        }
        let checker = UsesChecker::new(&self.config.uses_namespaces, self.baseline, |id, index| {
            self.wired((id, index)).cloned().into_iter().collect()
        });
        self.selected.values().find_map(|sel| {
            checker
                .check(&sel.resource)
                .map(|violation| (sel.resource.clone(), violation))
        })
    }

    fn in_uses_scope(&self, namespace: &str) -> bool {
        self.config.uses_namespaces.iter().any(|n| n == namespace)
    }

    /// Choice points behind a uses violation on `package`: the decisions
    /// along the paths from `resource` to each conflicting source
    fn uses_conflict(&self, resource: &Arc<Resource>, package: &str) -> Conflict {
        let mut conflict = self.reasons_of(resource.id());
        let mut stack: Vec<(CapabilityRef, Conflict)> = Vec::new();

        for index in 0..resource.requirements().len() {
            match self.decisions.get(&(resource.id(), index)) {
                Some(Decision {
                    choice,
                    capability: Some(capability),
                }) => {
                    if self.in_uses_scope(capability.namespace()) {
                        stack.push((capability.clone(), Conflict::from([*choice])));
                    }
                }
                // an unwired import may leave an own export in place
                Some(Decision { choice, capability: None }) => {
                    conflict.insert(*choice);
                }
                None => {}
            }
        }

        let mut visited: HashSet<(ResourceId, usize)> = HashSet::new();
        while let Some((capability, blame)) = stack.pop() {
            if !visited.insert(capability.key()) {
                continue;
            }
            if capability.name_in_namespace() == Some(package) {
                conflict.extend(blame.iter().copied());
            }
            for used in capability.uses() {
                for (source, step) in self.blamed_sources(capability.resource(), &used) {
                    let mut next = blame.clone();
                    next.extend(step);
                    stack.push((source, next));
                }
            }
        }
        conflict
    }

    /// Where `provider` gets package `name` from, with the choice points
    /// that made it so
    fn blamed_sources(&self, provider: &Arc<Resource>, name: &str) -> Vec<(CapabilityRef, Conflict)> {
        let mut sources = Vec::new();
        let mut unwired = Conflict::new();

        if self.baseline.contains(provider.id()) {
            for wire in self.baseline.required_wires(provider.id()) {
                let capability = wire.capability_ref();
                if self.in_uses_scope(capability.namespace()) && capability.name_in_namespace() == Some(name) {
                    sources.push((capability.clone(), Conflict::new()));
                }
            }
        } else {
            for index in 0..provider.requirements().len() {
                match self.decisions.get(&(provider.id(), index)) {
                    Some(Decision {
                        choice,
                        capability: Some(capability),
                    }) => {
                        if self.in_uses_scope(capability.namespace()) && capability.name_in_namespace() == Some(name) {
                            sources.push((capability.clone(), Conflict::from([*choice])));
                        }
                    }
                    Some(Decision { choice, capability: None }) => {
                        unwired.insert(*choice);
                    }
                    None => {}
                }
            }
        }

        if sources.is_empty() {
            for (index, capability) in provider.capabilities().iter().enumerate() {
                if capability.is_effective()
                    && self.in_uses_scope(capability.namespace())
                    && capability.name_in_namespace() == Some(name)
                {
                    if let Some(export) = CapabilityRef::new(provider.clone(), index) {
                        sources.push((export, unwired.clone()));
                    }
                }
            }
        }
        sources
    }

    /// Build the delta, adding the extra wires of multiple-cardinality requirements
    fn into_delta(self) -> WiringDelta {
        let mut extras: IndexMap<(ResourceId, usize), Vec<CapabilityRef>> = IndexMap::new();

        for sel in self.selected.values() {
            let resource = &sel.resource;
            for (index, requirement) in resource.requirements().iter().enumerate() {
                if !requirement.is_multiple() {
                    continue;
                }
                let key = (resource.id(), index);
                let Some(chosen) = self.wired(key) else {
                    continue;
                };
                for candidate in self.candidates.get(key) {
                    if candidate == chosen || !self.is_available(candidate.resource().id()) {
                        continue;
                    }
                    extras.entry(key).or_default().push(candidate.clone());
                    if self.config.check_uses && self.extra_breaks_uses(resource, &extras) {
                        if let Some(list) = extras.get_mut(&key) {
                            list.pop();
                        }
                    }
                }
            }
        }

        let mut delta = WiringDelta::new();
        for sel in self.selected.values() {
            let resource = &sel.resource;
            let mut wires = Vec::new();
            for index in 0..resource.requirements().len() {
                let key = (resource.id(), index);
                let Some(req) = RequirementRef::new(resource.clone(), index) else {
                    continue;
                };
                if let Some(chosen) = self.wired(key) {
                    wires.push(Wire::new(req.clone(), chosen.clone()));
                }
                for extra in extras.get(&key).into_iter().flatten() {
                    wires.push(Wire::new(req.clone(), extra.clone()));
                }
            }
            delta.insert(resource.clone(), wires);
        }
        delta
    }

    fn extra_breaks_uses(
        &self,
        resource: &Arc<Resource>,
        extras: &IndexMap<(ResourceId, usize), Vec<CapabilityRef>>,
    ) -> bool {
        let checker = UsesChecker::new(&self.config.uses_namespaces, self.baseline, |id, index| {
            let mut wired: Vec<CapabilityRef> = self.wired((id, index)).cloned().into_iter().collect();
            if let Some(more) = extras.get(&(id, index)) {
                wired.extend(more.iter().cloned());
            }
            wired
        });
        checker.check(resource).is_some()
    }
}
