//! Bound type for range endpoints

use std::fmt;

use crate::version::Version;

/// An endpoint of a version range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    version: Version,
    is_inclusive: bool,
}

impl Bound {
    /// Create a new bound
    pub fn new(version: Version, is_inclusive: bool) -> Self {
        Bound {
            version,
            is_inclusive,
        }
    }

    /// Inclusive bound at the given version
    pub fn inclusive(version: Version) -> Self {
        Self::new(version, true)
    }

    /// Exclusive bound at the given version
    pub fn exclusive(version: Version) -> Self {
        Self::new(version, false)
    }

    /// Get the version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Check if the bound is inclusive
    pub fn is_inclusive(&self) -> bool {
        self.is_inclusive
    }

    /// Check if this is the zero bound
    pub fn is_zero(&self) -> bool {
        self.version == Version::empty() && self.is_inclusive
    }

    /// Whether `version` lies on the allowed side of this bound used as a lower bound
    pub fn admits_from_below(&self, version: &Version) -> bool {
        if self.is_inclusive {
            version >= &self.version
        } else {
            version > &self.version
        }
    }

    /// Whether `version` lies on the allowed side of this bound used as an upper bound
    pub fn admits_from_above(&self, version: &Version) -> bool {
        if self.is_inclusive {
            version <= &self.version
        } else {
            version < &self.version
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.version,
            if self.is_inclusive {
                "inclusive"
            } else {
                "exclusive"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert!(Bound::inclusive(Version::empty()).is_zero());
        assert!(!Bound::exclusive(Version::empty()).is_zero());
    }

    #[test]
    fn test_admits() {
        let one = Version::new(1, 0, 0);
        assert!(Bound::inclusive(one.clone()).admits_from_below(&one));
        assert!(!Bound::exclusive(one.clone()).admits_from_below(&one));
        assert!(Bound::exclusive(one.clone()).admits_from_above(&Version::new(0, 9, 0)));
        assert!(!Bound::exclusive(one.clone()).admits_from_above(&one));
    }

    #[test]
    fn test_display() {
        assert_eq!(Bound::exclusive(Version::new(2, 0, 0)).to_string(), "2.0.0 [exclusive]");
    }
}
