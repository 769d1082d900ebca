//! Version parsing and ordering

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Error type for version and range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid version range \"{range}\": {reason}")]
    InvalidRange { range: String, reason: String },
    #[error("Numeric component out of range in \"{0}\"")]
    Overflow(String),
}

lazy_static! {
    // major[.minor[.micro[.qualifier]]], qualifier only allowed after micro
    static ref VERSION_RE: Regex = Regex::new(
        r"^(\d+)(?:\.(\d+)(?:\.(\d+)(?:\.([A-Za-z0-9_-]+))?)?)?$"
    ).unwrap();
}

/// A module version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    micro: u64,
    qualifier: String,
}

impl Version {
    /// Create a version without qualifier
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Create a version with a qualifier
    pub fn with_qualifier(major: u64, minor: u64, micro: u64, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: qualifier.into(),
        }
    }

    /// The empty version `0.0.0`, lowest possible value
    pub fn empty() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parse a version string. Surrounding whitespace is ignored and an
    /// empty string parses to [`Version::empty`].
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let caps = VERSION_RE
            .captures(trimmed)
            .ok_or_else(|| VersionError::InvalidVersion(version.to_string()))?;

        let number = |idx: usize| -> Result<u64, VersionError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse::<u64>()
                    .map_err(|_| VersionError::Overflow(version.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            micro: number(3)?,
            qualifier: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }

    /// Check whether a string parses as a version
    pub fn is_valid(version: &str) -> bool {
        Self::parse(version).is_ok()
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn micro(&self) -> u64 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// The next version after this one on the micro line with no qualifier.
    /// Used to build exclusive upper bounds such as `[1.2.3,1.2.4)`.
    pub fn next_micro(&self) -> Self {
        Self::new(self.major, self.minor, self.micro.saturating_add(1))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::empty()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let v = Version::parse("1.2.3.beta-1").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.micro(), 3);
        assert_eq!(v.qualifier(), "beta-1");
    }

    #[test]
    fn test_parse_partial() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.5").unwrap(), Version::new(1, 5, 0));
        assert_eq!(Version::parse(" 2.0.1 ").unwrap(), Version::new(2, 0, 1));
        assert_eq!(Version::parse("").unwrap(), Version::empty());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Version::parse("1.x").is_err());
        assert!(Version::parse("1.2.q").is_err());
        assert!(Version::parse("1.2.3.").is_err());
        assert!(Version::parse("v1.0").is_err());
        assert!(!Version::is_valid("1..2"));
        assert!(matches!(
            Version::parse("99999999999999999999999"),
            Err(VersionError::Overflow(_))
        ));
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| Version::parse(s).unwrap();
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.a") < v("1.0.0.b"));
        assert!(v("2") > v("1.99.99.zzz"));
        assert_eq!(v("1.0"), v("1.0.0"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::parse("1").unwrap().to_string(), "1.0.0");
        assert_eq!(Version::parse("1.2.3.RC1").unwrap().to_string(), "1.2.3.RC1");
    }

    #[test]
    fn test_next_micro() {
        assert_eq!(Version::parse("1.2.3.q").unwrap().next_micro(), Version::new(1, 2, 4));
    }
}
