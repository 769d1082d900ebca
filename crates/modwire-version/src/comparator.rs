//! Version comparison utilities

use crate::operator::Operator;
use crate::version::Version;

/// Comparator for comparing version strings
pub struct Comparator;

impl Comparator {
    /// Check if version1 > version2
    pub fn greater_than(version1: &str, version2: &str) -> bool {
        Self::compare(version1, Operator::GreaterThan, version2)
    }

    /// Check if version1 >= version2
    pub fn greater_than_or_equal_to(version1: &str, version2: &str) -> bool {
        Self::compare(version1, Operator::GreaterThanOrEqual, version2)
    }

    /// Check if version1 < version2
    pub fn less_than(version1: &str, version2: &str) -> bool {
        Self::compare(version1, Operator::LessThan, version2)
    }

    /// Check if version1 <= version2
    pub fn less_than_or_equal_to(version1: &str, version2: &str) -> bool {
        Self::compare(version1, Operator::LessThanOrEqual, version2)
    }

    /// Check if version1 == version2
    pub fn equal_to(version1: &str, version2: &str) -> bool {
        Self::compare(version1, Operator::Equal, version2)
    }

    /// Compare version1 to version2 using the given operator.
    ///
    /// Strings that do not parse as versions never compare true.
    pub fn compare(version1: &str, operator: Operator, version2: &str) -> bool {
        Self::try_compare(version1, operator, version2).unwrap_or(false)
    }

    /// Compare two version strings, returning `None` if either fails to parse
    pub fn try_compare(version1: &str, operator: Operator, version2: &str) -> Option<bool> {
        let left = Version::parse(version1).ok()?;
        let right = Version::parse(version2).ok()?;
        Some(Self::compare_versions(&left, operator, &right))
    }

    /// Compare two parsed versions
    pub fn compare_versions(left: &Version, operator: Operator, right: &Version) -> bool {
        operator.accepts(left.cmp(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greater_than() {
        assert!(Comparator::greater_than("1.25.0", "1.24.0"));
        assert!(!Comparator::greater_than("1.25.0", "1.25.0"));
        assert!(!Comparator::greater_than("1.25.0", "1.26.0"));
        assert!(Comparator::greater_than("1.0.0.b", "1.0.0.a"));
    }

    #[test]
    fn test_greater_than_or_equal_to() {
        assert!(Comparator::greater_than_or_equal_to("1.25.0", "1.24.0"));
        assert!(Comparator::greater_than_or_equal_to("1.25", "1.25.0"));
        assert!(!Comparator::greater_than_or_equal_to("1.25.0", "1.26.0"));
    }

    #[test]
    fn test_less_than() {
        assert!(!Comparator::less_than("1.25.0", "1.24.0"));
        assert!(Comparator::less_than("1.25.0", "1.26.0"));
        assert!(Comparator::less_than("1.0.0", "1.0.0.SNAPSHOT"));
    }

    #[test]
    fn test_less_than_or_equal_to() {
        assert!(!Comparator::less_than_or_equal_to("1.25.0", "1.24.0"));
        assert!(Comparator::less_than_or_equal_to("1.25.0", "1.25.0"));
    }

    #[test]
    fn test_equal_to() {
        assert!(Comparator::equal_to("1", "1.0.0"));
        assert!(!Comparator::equal_to("1.0.0", "1.0.0.q"));
    }

    #[test]
    fn test_invalid_never_matches() {
        assert!(!Comparator::equal_to("foo", "foo"));
        assert_eq!(Comparator::try_compare("1.0", Operator::Equal, "bar"), None);
    }
}
