//! Diagnostic report of a resolve attempt.
//!
//! The report maps each resource to the ordered entries recorded for it.
//! It is assembled with a [`ReportBuilder`] while the attempt runs and
//! frozen into an immutable [`ResolutionReport`] once it concludes.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::filter::FilterError;
use crate::resource::{CapabilityRef, RequirementRef, Resource, ResourceId};

/// Kind of a report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    MissingCapability,
    FilteredByResolverHook,
    SingletonSelection,
    UnresolvedProvider,
    UsesConstraintViolation,
    InvalidFilter,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::MissingCapability => "MISSING_CAPABILITY",
            EntryType::FilteredByResolverHook => "FILTERED_BY_RESOLVER_HOOK",
            EntryType::SingletonSelection => "SINGLETON_SELECTION",
            EntryType::UnresolvedProvider => "UNRESOLVED_PROVIDER",
            EntryType::UsesConstraintViolation => "USES_CONSTRAINT_VIOLATION",
            EntryType::InvalidFilter => "INVALID_FILTER",
        }
    }

    /// Whether the entry explains why a resource could not resolve.
    /// Blocking entries are dropped for resources that resolve in the end.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, EntryType::InvalidFilter)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload of an entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryData {
    /// The requirement nothing could satisfy
    Requirement(RequirementRef),
    /// Resources whose presence excluded a singleton
    Blockers(Vec<Arc<Resource>>),
    /// A requirement whose candidates all failed
    Candidates {
        requirement: RequirementRef,
        candidates: Vec<CapabilityRef>,
    },
    /// Distinct sources of one package reachable from the same resource
    UsesConflict {
        package: String,
        sources: Vec<CapabilityRef>,
    },
    /// A requirement with a malformed filter
    InvalidFilter {
        requirement: RequirementRef,
        error: FilterError,
    },
}

/// One recorded decision or rejection
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    entry_type: EntryType,
    data: Option<EntryData>,
}

impl Entry {
    pub fn new(entry_type: EntryType, data: Option<EntryData>) -> Self {
        Self { entry_type, data }
    }

    pub fn missing_capability(requirement: RequirementRef) -> Self {
        Self::new(EntryType::MissingCapability, Some(EntryData::Requirement(requirement)))
    }

    pub fn filtered_by_resolver_hook() -> Self {
        Self::new(EntryType::FilteredByResolverHook, None)
    }

    pub fn singleton_selection(blockers: Vec<Arc<Resource>>) -> Self {
        Self::new(EntryType::SingletonSelection, Some(EntryData::Blockers(blockers)))
    }

    pub fn unresolved_provider(requirement: RequirementRef, candidates: Vec<CapabilityRef>) -> Self {
        Self::new(
            EntryType::UnresolvedProvider,
            Some(EntryData::Candidates {
                requirement,
                candidates,
            }),
        )
    }

    pub fn uses_constraint_violation(package: impl Into<String>, sources: Vec<CapabilityRef>) -> Self {
        Self::new(
            EntryType::UsesConstraintViolation,
            Some(EntryData::UsesConflict {
                package: package.into(),
                sources,
            }),
        )
    }

    pub fn invalid_filter(requirement: RequirementRef, error: FilterError) -> Self {
        Self::new(
            EntryType::InvalidFilter,
            Some(EntryData::InvalidFilter { requirement, error }),
        )
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn data(&self) -> Option<&EntryData> {
        self.data.as_ref()
    }

    /// Human-readable explanation
    pub fn message(&self) -> String {
        match (&self.entry_type, &self.data) {
            (EntryType::FilteredByResolverHook, _) => "Filtered out by a resolver hook".to_string(),
            (_, Some(EntryData::Requirement(req))) => {
                format!("Missing requirement {}", describe_requirement(req))
            }
            (_, Some(EntryData::Blockers(blockers))) => format!(
                "Another singleton was selected: {}",
                join(blockers.iter().map(|b| b.to_string()))
            ),
            (_, Some(EntryData::Candidates {
                requirement,
                candidates,
            })) => format!(
                "No provider of {} could be resolved; tried {}",
                describe_requirement(requirement),
                join(candidates.iter().map(|c| c.resource().to_string()))
            ),
            (_, Some(EntryData::UsesConflict { package, sources })) => format!(
                "Uses constraint violation: package {} is reachable from {}",
                package,
                join(sources.iter().map(|s| s.resource().to_string()))
            ),
            (_, Some(EntryData::InvalidFilter { requirement, error })) => format!(
                "Invalid filter in requirement {}: {}",
                describe_requirement(requirement),
                error.reason
            ),
            (entry_type, None) => entry_type.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        let data = match &self.data {
            None => Value::Null,
            Some(EntryData::Requirement(req)) => json!({ "requirement": requirement_json(req) }),
            Some(EntryData::Blockers(blockers)) => json!({
                "blockers": blockers.iter().map(|b| resource_json(b)).collect::<Vec<_>>(),
            }),
            Some(EntryData::Candidates {
                requirement,
                candidates,
            }) => json!({
                "requirement": requirement_json(requirement),
                "candidates": candidates.iter().map(capability_json).collect::<Vec<_>>(),
            }),
            Some(EntryData::UsesConflict { package, sources }) => json!({
                "package": package,
                "sources": sources.iter().map(capability_json).collect::<Vec<_>>(),
            }),
            Some(EntryData::InvalidFilter { requirement, error }) => json!({
                "requirement": requirement_json(requirement),
                "error": error.to_string(),
            }),
        };
        json!({
            "type": self.entry_type,
            "message": self.message(),
            "data": data,
        })
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

fn describe_requirement(req: &RequirementRef) -> String {
    format!("{}: {}", req.namespace(), req.filter().unwrap_or("*"))
}

fn resource_json(resource: &Resource) -> Value {
    json!({
        "id": resource.id(),
        "name": resource.symbolic_name(),
        "version": resource.version().to_string(),
        "location": resource.location(),
    })
}

fn requirement_json(req: &RequirementRef) -> Value {
    json!({
        "namespace": req.namespace(),
        "filter": req.filter(),
        "directives": req.directives(),
    })
}

fn capability_json(cap: &CapabilityRef) -> Value {
    json!({
        "provider": resource_json(cap.resource()),
        "namespace": cap.namespace(),
        "attributes": cap.attributes(),
    })
}

/// Immutable record of every entry made during one resolve call
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    resources: IndexMap<ResourceId, Arc<Resource>>,
    entries: IndexMap<ResourceId, Vec<Entry>>,
}

impl ResolutionReport {
    /// Entries per resource, in the order resources were first reported
    pub fn entries(&self) -> &IndexMap<ResourceId, Vec<Entry>> {
        &self.entries
    }

    pub fn entries_for(&self, id: ResourceId) -> &[Entry] {
        self.entries.get(&id).map_or(&[][..], |e| e.as_slice())
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Arc<Resource>> {
        self.resources.get(&id)
    }

    /// Resources that have entries
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether a resource has any blocking entry
    pub fn has_blocking_entries(&self, id: ResourceId) -> bool {
        self.entries_for(id).iter().any(|e| e.entry_type().is_blocking())
    }

    /// All entries of one type with the resource they belong to
    pub fn entries_of_type(&self, entry_type: EntryType) -> Vec<(&Arc<Resource>, &Entry)> {
        let mut found = Vec::new();
        for (id, entries) in &self.entries {
            if let Some(resource) = self.resources.get(id) {
                found.extend(entries.iter().filter(|e| e.entry_type() == entry_type).map(|e| (resource, e)));
            }
        }
        found
    }

    /// One-line summary used in error messages
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "no diagnostics recorded".to_string();
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(id, entries)| {
                let resource = self.resources.get(id)?;
                let types: Vec<&str> = entries.iter().map(|e| e.entry_type().as_str()).collect();
                Some(format!("{} ({})", resource, types.join(", ")))
            })
            .collect();
        parts.join("; ")
    }

    /// Text explaining why one resource did not resolve
    pub fn describe_resource(&self, id: ResourceId) -> String {
        let Some(resource) = self.resources.get(&id) else {
            return String::new();
        };
        let mut lines = vec![format!("{} [{}]", resource, resource.location())];
        for entry in self.entries_for(id) {
            lines.push(format!("  - {}: {}", entry.entry_type(), entry.message()));
        }
        lines.join("\n")
    }

    /// Multi-line rendering of the whole report
    pub fn describe(&self) -> String {
        self.entries
            .keys()
            .map(|id| self.describe_resource(*id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> Value {
        let resources: Vec<Value> = self
            .entries
            .iter()
            .filter_map(|(id, entries)| {
                let resource = self.resources.get(id)?;
                Some(json!({
                    "resource": resource_json(resource),
                    "entries": entries.iter().map(Entry::to_json).collect::<Vec<_>>(),
                }))
            })
            .collect();
        json!({ "resources": resources })
    }
}

/// Collects entries while a resolve attempt runs
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: ResolutionReport,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry. Returns false when the same entry was already recorded.
    pub fn add_entry(&mut self, resource: &Arc<Resource>, entry: Entry) -> bool {
        let entries = self.report.entries.entry(resource.id()).or_default();
        if entries.contains(&entry) {
            return false;
        }
        log::debug!("Report entry for {}: {}", resource, entry.message());
        entries.push(entry);
        self.report
            .resources
            .entry(resource.id())
            .or_insert_with(|| resource.clone());
        true
    }

    pub fn has_entries(&self, id: ResourceId) -> bool {
        self.report.entries.get(&id).map_or(false, |e| !e.is_empty())
    }

    /// Drop blocking entries of resources that resolved after all
    pub fn remove_blocking(&mut self, resolved: &HashSet<ResourceId>) {
        for (id, entries) in self.report.entries.iter_mut() {
            if resolved.contains(id) {
                entries.retain(|e| !e.entry_type().is_blocking());
            }
        }
        self.report.entries.retain(|_, entries| !entries.is_empty());
        let entries = &self.report.entries;
        self.report.resources.retain(|id, _| entries.contains_key(id));
    }

    pub fn build(self) -> ResolutionReport {
        self.report
    }
}
