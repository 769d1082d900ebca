use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::filter::{Filter, FilterError};

use super::attribute::{Attributes, Directives};
use super::capability::Capability;
use super::namespace::{
    CARDINALITY_DIRECTIVE, CARDINALITY_MULTIPLE, EFFECTIVE_DIRECTIVE, EFFECTIVE_RESOLVE,
    RESOLUTION_DIRECTIVE, RESOLUTION_OPTIONAL,
};
use super::resource::{Resource, ResourceId};

/// Something a resource needs from others.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub(crate) resource: ResourceId,
    pub(crate) index: usize,
    namespace: String,
    filter_source: Option<String>,
    filter: Option<Result<Filter, FilterError>>,
    attributes: Attributes,
    directives: Directives,
}

impl Requirement {
    pub(crate) fn new(
        namespace: impl Into<String>,
        filter: Option<String>,
        attributes: Attributes,
        directives: Directives,
    ) -> Self {
        let parsed = filter.as_deref().map(Filter::parse);
        Self {
            resource: ResourceId::default(),
            index: 0,
            namespace: namespace.into(),
            filter_source: filter,
            filter: parsed,
            attributes,
            directives,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Filter string as declared
    pub fn filter(&self) -> Option<&str> {
        self.filter_source.as_deref()
    }

    /// Parse error of the declared filter, if any
    pub fn filter_error(&self) -> Option<&FilterError> {
        match &self.filter {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn is_optional(&self) -> bool {
        self.directive(RESOLUTION_DIRECTIVE) == Some(RESOLUTION_OPTIONAL)
    }

    pub fn is_multiple(&self) -> bool {
        self.directive(CARDINALITY_DIRECTIVE) == Some(CARDINALITY_MULTIPLE)
    }

    pub fn is_effective(&self) -> bool {
        self.directive(EFFECTIVE_DIRECTIVE).map_or(true, |e| e == EFFECTIVE_RESOLVE)
    }

    /// Check whether `capability` satisfies this requirement.
    ///
    /// A malformed filter never matches.
    pub fn matches(&self, capability: &Capability) -> bool {
        if self.namespace != capability.namespace() || !capability.is_effective() {
            return false;
        }

        let filter = match &self.filter {
            None => None,
            Some(Ok(filter)) => Some(filter),
            Some(Err(_)) => return false,
        };

        let mandatory = capability.mandatory_attributes();
        if !mandatory.is_empty() {
            let referenced = filter.map(Filter::attribute_names).unwrap_or_default();
            if !mandatory
                .iter()
                .all(|m| referenced.contains(&m.to_lowercase()))
            {
                return false;
            }
        }

        filter.map_or(true, |f| f.matches(capability.attributes()))
    }
}

/// A requirement together with the resource that declares it.
#[derive(Clone)]
pub struct RequirementRef {
    resource: Arc<Resource>,
    index: usize,
}

impl RequirementRef {
    pub fn new(resource: Arc<Resource>, index: usize) -> Option<Self> {
        if index < resource.requirements().len() {
            Some(Self { resource, index })
        } else {
            None
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn requirement(&self) -> &Requirement {
        &self.resource.requirements()[self.index]
    }

    pub(crate) fn key(&self) -> (ResourceId, usize) {
        (self.resource.id(), self.index)
    }
}

impl Deref for RequirementRef {
    type Target = Requirement;

    fn deref(&self) -> &Requirement {
        self.requirement()
    }
}

impl PartialEq for RequirementRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RequirementRef {}

impl Hash for RequirementRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}: {}]",
            self.resource,
            self.namespace(),
            self.filter().unwrap_or("*")
        )
    }
}
