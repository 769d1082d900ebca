use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use modwire_version::Version;

use super::attribute::{AttributeValue, Attributes, Directives};
use super::namespace::{
    split_list, EFFECTIVE_DIRECTIVE, EFFECTIVE_RESOLVE, MANDATORY_DIRECTIVE, SINGLETON_DIRECTIVE,
    USES_DIRECTIVE, VERSION_ATTRIBUTE,
};
use super::resource::{Resource, ResourceId};

/// Something a resource offers to others.
///
/// Capabilities are declared when the resource is built and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub(crate) resource: ResourceId,
    pub(crate) index: usize,
    namespace: String,
    attributes: Attributes,
    directives: Directives,
}

impl Capability {
    pub(crate) fn new(namespace: impl Into<String>, attributes: Attributes, directives: Directives) -> Self {
        Self {
            resource: ResourceId::default(),
            index: 0,
            namespace: namespace.into(),
            attributes,
            directives,
        }
    }

    /// Id of the declaring resource
    pub fn resource_id(&self) -> ResourceId {
        self.resource
    }

    /// Position in the declaring resource's capability list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    /// The `version` attribute, when it carries a version
    pub fn version(&self) -> Option<&Version> {
        self.attribute(VERSION_ATTRIBUTE).and_then(AttributeValue::as_version)
    }

    /// Capabilities with an `effective` other than `resolve` are invisible to the resolver
    pub fn is_effective(&self) -> bool {
        self.directive(EFFECTIVE_DIRECTIVE).map_or(true, |e| e == EFFECTIVE_RESOLVE)
    }

    /// Attributes a requirement filter must mention to match
    pub fn mandatory_attributes(&self) -> Vec<String> {
        self.directive(MANDATORY_DIRECTIVE)
            .map(split_list)
            .unwrap_or_default()
    }

    /// Package names listed in the `uses` directive
    pub fn uses(&self) -> Vec<String> {
        self.directive(USES_DIRECTIVE).map(split_list).unwrap_or_default()
    }

    pub fn is_singleton(&self) -> bool {
        self.directive(SINGLETON_DIRECTIVE) == Some("true")
    }

    /// Value of the attribute named after the namespace, e.g. the package name
    pub fn name_in_namespace(&self) -> Option<&str> {
        self.attribute(&self.namespace).and_then(AttributeValue::as_str)
    }
}

/// A capability together with the resource that declares it.
///
/// Equality and hashing use the owning resource id and the capability index.
#[derive(Clone)]
pub struct CapabilityRef {
    resource: Arc<Resource>,
    index: usize,
}

impl CapabilityRef {
    /// Returns `None` when the resource has no capability at `index`
    pub fn new(resource: Arc<Resource>, index: usize) -> Option<Self> {
        if index < resource.capabilities().len() {
            Some(Self { resource, index })
        } else {
            None
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn capability(&self) -> &Capability {
        &self.resource.capabilities()[self.index]
    }

    /// Version used to rank this capability against others
    pub fn effective_version(&self) -> &Version {
        self.capability().version().unwrap_or_else(|| self.resource.version())
    }

    pub(crate) fn key(&self) -> (ResourceId, usize) {
        (self.resource.id(), self.index)
    }
}

impl Deref for CapabilityRef {
    type Target = Capability;

    fn deref(&self) -> &Capability {
        self.capability()
    }
}

impl PartialEq for CapabilityRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for CapabilityRef {}

impl Hash for CapabilityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name_in_namespace() {
            Some(name) => write!(f, "{} [{}: {} {}]", self.resource, self.namespace(), name, self.effective_version()),
            None => write!(f, "{} [{}]", self.resource, self.namespace()),
        }
    }
}
