use std::fmt;
use std::hash::{Hash, Hasher};

use modwire_version::{Version, VersionError, VersionRange};
use serde::Serialize;

use super::attribute::{AttributeValue, Attributes, Directives};
use super::capability::Capability;
use super::namespace::{
    IDENTITY_NAMESPACE, MODULE_NAMESPACE, MODULE_VERSION_ATTRIBUTE, PACKAGE_NAMESPACE,
    RESOLUTION_DIRECTIVE, RESOLUTION_OPTIONAL, SINGLETON_DIRECTIVE, TYPE_ATTRIBUTE, TYPE_MODULE,
    VERSION_ATTRIBUTE,
};
use super::requirement::Requirement;

/// Identifier assigned to a resource at install time.
///
/// Ids grow with install order and are never reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An installed module revision with its capabilities and requirements.
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    location: String,
    symbolic_name: String,
    version: Version,
    resource_type: String,
    singleton: bool,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Resource {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Install location, unique among installed resources
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// All capabilities, the identity capability first
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Capabilities in one namespace
    pub fn capabilities_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Capability> + 'a {
        self.capabilities.iter().filter(move |c| c.namespace() == namespace)
    }

    /// Requirements in one namespace
    pub fn requirements_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.requirements.iter().filter(move |r| r.namespace() == namespace)
    }

    /// Index of the identity capability
    pub fn identity_index(&self) -> usize {
        0
    }

    pub fn identity(&self) -> &Capability {
        &self.capabilities[self.identity_index()]
    }

    /// Pretty name such as `com.acme.core@1.2.0`
    pub fn pretty_string(&self) -> String {
        format!("{}@{}", self.symbolic_name, self.version)
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbolic_name, self.version)
    }
}

/// Describes a resource before it is installed.
///
/// Version strings are parsed lazily; the first parse error is reported
/// when the resource is installed.
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    symbolic_name: String,
    version: String,
    resource_type: String,
    singleton: bool,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    error: Option<VersionError>,
}

impl ResourceBuilder {
    pub fn new(symbolic_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            resource_type: TYPE_MODULE.to_string(),
            singleton: false,
            capabilities: Vec::new(),
            requirements: Vec::new(),
            error: None,
        }
    }

    /// Mark the resource as a singleton
    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Set the identity type. Only `osgi.bundle` resources get a module capability.
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Declare a capability
    pub fn capability<K, V, D, E>(
        mut self,
        namespace: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
        directives: impl IntoIterator<Item = (D, E)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
        D: Into<String>,
        E: Into<String>,
    {
        let attributes: Attributes = attributes.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let directives: Directives = directives.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.capabilities.push(Capability::new(namespace, attributes, directives));
        self
    }

    /// Declare a requirement with an optional filter
    pub fn requirement<D, E>(
        mut self,
        namespace: &str,
        filter: Option<&str>,
        directives: impl IntoIterator<Item = (D, E)>,
    ) -> Self
    where
        D: Into<String>,
        E: Into<String>,
    {
        let directives: Directives = directives.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.requirements.push(Requirement::new(
            namespace,
            filter.map(String::from),
            Attributes::new(),
            directives,
        ));
        self
    }

    /// Export a package at a version
    pub fn export_package(self, name: &str, version: &str) -> Self {
        self.export_package_with(name, version, Vec::<(String, String)>::new())
    }

    /// Export a package that uses the listed packages
    pub fn export_package_uses(self, name: &str, version: &str, uses: &[&str]) -> Self {
        self.export_package_with(name, version, vec![("uses".to_string(), uses.join(","))])
    }

    /// Export a package with extra directives
    pub fn export_package_with<D, E>(
        mut self,
        name: &str,
        version: &str,
        directives: impl IntoIterator<Item = (D, E)>,
    ) -> Self
    where
        D: Into<String>,
        E: Into<String>,
    {
        let version = match self.parse_version(version) {
            Some(v) => v,
            None => return self,
        };
        self.capability(
            PACKAGE_NAMESPACE,
            vec![
                (PACKAGE_NAMESPACE.to_string(), AttributeValue::from(name)),
                (VERSION_ATTRIBUTE.to_string(), AttributeValue::Version(version)),
            ],
            directives,
        )
    }

    /// Import a package in a version range
    pub fn import_package(self, name: &str, range: &str) -> Self {
        self.import_package_with(name, range, Vec::<(String, String)>::new())
    }

    /// Import a package, leaving it unwired when no provider exists
    pub fn import_package_optional(self, name: &str, range: &str) -> Self {
        self.import_package_with(name, range, vec![(RESOLUTION_DIRECTIVE, RESOLUTION_OPTIONAL)])
    }

    /// Import a package with extra directives
    pub fn import_package_with<D, E>(
        mut self,
        name: &str,
        range: &str,
        directives: impl IntoIterator<Item = (D, E)>,
    ) -> Self
    where
        D: Into<String>,
        E: Into<String>,
    {
        let range = match self.parse_range(range) {
            Some(r) => r,
            None => return self,
        };
        let filter = format!(
            "(&({}={}){})",
            PACKAGE_NAMESPACE,
            crate::filter::escape(name),
            range.to_filter_string(VERSION_ATTRIBUTE)
        );
        self.requirement(PACKAGE_NAMESPACE, Some(&filter), directives)
    }

    /// Require a whole module by symbolic name
    pub fn require_module(mut self, name: &str, range: &str) -> Self {
        let range = match self.parse_range(range) {
            Some(r) => r,
            None => return self,
        };
        let filter = format!(
            "(&({}={}){})",
            MODULE_NAMESPACE,
            crate::filter::escape(name),
            range.to_filter_string(MODULE_VERSION_ATTRIBUTE)
        );
        self.requirement(MODULE_NAMESPACE, Some(&filter), Vec::<(String, String)>::new())
    }

    fn parse_version(&mut self, version: &str) -> Option<Version> {
        match Version::parse(version) {
            Ok(v) => Some(v),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    fn parse_range(&mut self, range: &str) -> Option<VersionRange> {
        match VersionRange::parse(range) {
            Ok(r) => Some(r),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    /// Create the resource with its final id and location
    pub(crate) fn build(self, id: ResourceId, location: &str) -> Result<Resource, VersionError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let version = Version::parse(&self.version)?;

        let mut identity_directives = Directives::new();
        if self.singleton {
            identity_directives.insert(SINGLETON_DIRECTIVE.to_string(), "true".to_string());
        }
        let mut identity_attributes = Attributes::new();
        identity_attributes.insert(IDENTITY_NAMESPACE.to_string(), AttributeValue::from(self.symbolic_name.as_str()));
        identity_attributes.insert(VERSION_ATTRIBUTE.to_string(), AttributeValue::Version(version.clone()));
        identity_attributes.insert(TYPE_ATTRIBUTE.to_string(), AttributeValue::from(self.resource_type.as_str()));

        let mut capabilities = vec![Capability::new(IDENTITY_NAMESPACE, identity_attributes, identity_directives)];

        if self.resource_type == TYPE_MODULE {
            let mut module_attributes = Attributes::new();
            module_attributes.insert(MODULE_NAMESPACE.to_string(), AttributeValue::from(self.symbolic_name.as_str()));
            module_attributes.insert(MODULE_VERSION_ATTRIBUTE.to_string(), AttributeValue::Version(version.clone()));
            capabilities.push(Capability::new(MODULE_NAMESPACE, module_attributes, Directives::new()));
        }

        capabilities.extend(self.capabilities);
        for (index, capability) in capabilities.iter_mut().enumerate() {
            capability.resource = id;
            capability.index = index;
        }

        let mut requirements = self.requirements;
        for (index, requirement) in requirements.iter_mut().enumerate() {
            requirement.resource = id;
            requirement.index = index;
        }

        Ok(Resource {
            id,
            location: location.to_string(),
            symbolic_name: self.symbolic_name,
            version,
            resource_type: self.resource_type,
            singleton: self.singleton,
            capabilities,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: ResourceBuilder) -> Resource {
        builder.build(ResourceId(1), "loc").unwrap()
    }

    #[test]
    fn test_identity_capability() {
        let r = build(ResourceBuilder::new("com.acme.core", "1.2").singleton(true));
        let identity = r.identity();
        assert_eq!(identity.namespace(), IDENTITY_NAMESPACE);
        assert_eq!(identity.name_in_namespace(), Some("com.acme.core"));
        assert_eq!(identity.version(), Some(&Version::new(1, 2, 0)));
        assert!(identity.is_singleton());
        assert_eq!(identity.resource_id(), ResourceId(1));
        assert_eq!(r.to_string(), "com.acme.core@1.2.0");
    }

    #[test]
    fn test_module_capability_only_for_modules() {
        let module = build(ResourceBuilder::new("a", "1"));
        assert_eq!(module.capabilities_in(MODULE_NAMESPACE).count(), 1);

        let fragment = build(ResourceBuilder::new("a", "1").resource_type("osgi.fragment"));
        assert_eq!(fragment.capabilities_in(MODULE_NAMESPACE).count(), 0);
    }

    #[test]
    fn test_package_helpers() {
        let r = build(
            ResourceBuilder::new("a", "1")
                .export_package("com.acme.api", "1.5")
                .import_package("org.util", "[1.0,2.0)"),
        );
        let export = r.capabilities_in(PACKAGE_NAMESPACE).next().unwrap();
        assert_eq!(export.name_in_namespace(), Some("com.acme.api"));
        assert_eq!(export.index(), 2);

        let import = &r.requirements()[0];
        assert_eq!(
            import.filter(),
            Some("(&(osgi.wiring.package=org.util)(&(version>=1.0.0)(!(version>=2.0.0))))")
        );
        assert!(import.filter_error().is_none());
        assert!(!import.is_optional());
    }

    #[test]
    fn test_invalid_versions_surface_at_build() {
        let err = ResourceBuilder::new("a", "1.x").build(ResourceId(1), "loc").unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersion(_)));

        let err = ResourceBuilder::new("a", "1")
            .import_package("p", "[1,")
            .build(ResourceId(1), "loc")
            .unwrap_err();
        assert!(matches!(err, VersionError::InvalidRange { .. }));
    }

    #[test]
    fn test_requirement_matching() {
        let provider = build(ResourceBuilder::new("p", "1").export_package("org.util", "1.4"));
        let consumer = build(
            ResourceBuilder::new("c", "1")
                .import_package("org.util", "[1.0,2.0)")
                .import_package("org.util", "2.0"),
        );
        let export = provider.capabilities_in(PACKAGE_NAMESPACE).next().unwrap();
        assert!(consumer.requirements()[0].matches(export));
        assert!(!consumer.requirements()[1].matches(export));
        assert!(!consumer.requirements()[0].matches(provider.identity()));
    }

    #[test]
    fn test_mandatory_attributes() {
        let provider = build(ResourceBuilder::new("p", "1").capability(
            "acme.service",
            vec![("acme.service", AttributeValue::from("log")), ("vendor", AttributeValue::from("x"))],
            vec![("mandatory", "vendor")],
        ));
        let cap = provider.capabilities_in("acme.service").next().unwrap();
        let plain = build(ResourceBuilder::new("c", "1").requirement(
            "acme.service",
            Some("(acme.service=log)"),
            Vec::<(String, String)>::new(),
        ));
        let with_vendor = build(ResourceBuilder::new("c", "1").requirement(
            "acme.service",
            Some("(&(acme.service=log)(Vendor=x))"),
            Vec::<(String, String)>::new(),
        ));
        assert!(!plain.requirements()[0].matches(cap));
        assert!(with_vendor.requirements()[0].matches(cap));
    }

    #[test]
    fn test_effective_directive() {
        let provider = build(ResourceBuilder::new("p", "1").capability(
            "acme.x",
            Vec::<(String, AttributeValue)>::new(),
            vec![("effective", "active")],
        ));
        let consumer = build(ResourceBuilder::new("c", "1").requirement(
            "acme.x",
            None,
            vec![("effective", "active")],
        ));
        let cap = provider.capabilities_in("acme.x").next().unwrap();
        assert!(!cap.is_effective());
        assert!(!consumer.requirements()[0].is_effective());
        assert!(!consumer.requirements()[0].matches(cap));
    }

    #[test]
    fn test_invalid_filter_never_matches() {
        let provider = build(ResourceBuilder::new("p", "1").capability(
            "acme.x",
            Vec::<(String, AttributeValue)>::new(),
            Vec::<(String, String)>::new(),
        ));
        let consumer = build(ResourceBuilder::new("c", "1").requirement(
            "acme.x",
            Some("(broken"),
            Vec::<(String, String)>::new(),
        ));
        let cap = provider.capabilities_in("acme.x").next().unwrap();
        assert!(consumer.requirements()[0].filter_error().is_some());
        assert!(!consumer.requirements()[0].matches(cap));
    }
}
