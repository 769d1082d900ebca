//! Well-known namespaces, attribute names and directive names.

/// Identity of a resource: symbolic name, version and type
pub const IDENTITY_NAMESPACE: &str = "osgi.identity";
/// Exported and imported packages
pub const PACKAGE_NAMESPACE: &str = "osgi.wiring.package";
/// Whole-module requirements
pub const MODULE_NAMESPACE: &str = "osgi.wiring.bundle";

pub const VERSION_ATTRIBUTE: &str = "version";
pub const MODULE_VERSION_ATTRIBUTE: &str = "bundle-version";
pub const TYPE_ATTRIBUTE: &str = "type";

/// Default value of the identity `type` attribute
pub const TYPE_MODULE: &str = "osgi.bundle";

pub const RESOLUTION_DIRECTIVE: &str = "resolution";
pub const RESOLUTION_MANDATORY: &str = "mandatory";
pub const RESOLUTION_OPTIONAL: &str = "optional";

pub const CARDINALITY_DIRECTIVE: &str = "cardinality";
pub const CARDINALITY_SINGLE: &str = "single";
pub const CARDINALITY_MULTIPLE: &str = "multiple";

pub const EFFECTIVE_DIRECTIVE: &str = "effective";
pub const EFFECTIVE_RESOLVE: &str = "resolve";

pub const FILTER_DIRECTIVE: &str = "filter";
pub const MANDATORY_DIRECTIVE: &str = "mandatory";
pub const USES_DIRECTIVE: &str = "uses";
pub const SINGLETON_DIRECTIVE: &str = "singleton";

/// Split a comma-separated directive value, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" ").is_empty());
    }
}
