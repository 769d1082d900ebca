//! Version ranges in interval notation

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::bound::Bound;
use crate::version::{Version, VersionError};

lazy_static! {
    static ref INTERVAL_RE: Regex = Regex::new(
        r"^\s*([\[(])\s*([^,\s]+)\s*,\s*([^\])\s]+)\s*([\])])\s*$"
    ).unwrap();
}

/// A range of versions.
///
/// `[1.0,2.0)` includes 1.0 and excludes 2.0; a bare `1.0` means "1.0 or
/// later" with no upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    left: Bound,
    right: Option<Bound>,
}

impl VersionRange {
    /// Range from `left` with an optional upper bound
    pub fn new(left: Bound, right: Option<Bound>) -> Self {
        Self { left, right }
    }

    /// `version` or later
    pub fn at_least(version: Version) -> Self {
        Self::new(Bound::inclusive(version), None)
    }

    /// Exactly `version`
    pub fn exact(version: Version) -> Self {
        Self::new(Bound::inclusive(version.clone()), Some(Bound::inclusive(version)))
    }

    /// Every version
    pub fn any() -> Self {
        Self::at_least(Version::empty())
    }

    /// Parse a range string
    pub fn parse(range: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidRange {
            range: range.to_string(),
            reason: reason.to_string(),
        };

        if let Some(caps) = INTERVAL_RE.captures(range) {
            let left = Version::parse(&caps[2]).map_err(|e| invalid(&e.to_string()))?;
            let right = Version::parse(&caps[3]).map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::new(
                Bound::new(left, &caps[1] == "["),
                Some(Bound::new(right, &caps[4] == "]")),
            ));
        }

        let trimmed = range.trim();
        if trimmed.starts_with(['[', '(']) || trimmed.ends_with([']', ')']) || trimmed.contains(',') {
            return Err(invalid("malformed interval"));
        }

        Version::parse(trimmed)
            .map(Self::at_least)
            .map_err(|e| invalid(&e.to_string()))
    }

    pub fn left(&self) -> &Bound {
        &self.left
    }

    pub fn right(&self) -> Option<&Bound> {
        self.right.as_ref()
    }

    /// Check whether a version falls inside the range
    pub fn includes(&self, version: &Version) -> bool {
        self.left.admits_from_below(version)
            && self.right.as_ref().map_or(true, |r| r.admits_from_above(version))
    }

    /// Whether the range admits exactly one version
    pub fn is_exact(&self) -> bool {
        match &self.right {
            Some(right) => {
                self.left.is_inclusive() && right.is_inclusive() && self.left.version() == right.version()
            }
            None => false,
        }
    }

    /// Whether no version can satisfy the range
    pub fn is_empty(&self) -> bool {
        match &self.right {
            Some(right) => {
                let (l, r) = (self.left.version(), right.version());
                l > r || (l == r && !(self.left.is_inclusive() && right.is_inclusive()))
            }
            None => false,
        }
    }

    /// Render the range as an LDAP-style filter fragment over `attribute`
    pub fn to_filter_string(&self, attribute: &str) -> String {
        if self.is_exact() {
            return format!("({}={})", attribute, self.left.version());
        }

        let lower = if self.left.is_inclusive() {
            format!("({}>={})", attribute, self.left.version())
        } else {
            format!("(!({}<={}))", attribute, self.left.version())
        };

        match &self.right {
            None => lower,
            Some(right) => {
                let upper = if right.is_inclusive() {
                    format!("({}<={})", attribute, right.version())
                } else {
                    format!("(!({}>={}))", attribute, right.version())
                };
                format!("(&{}{})", lower, upper)
            }
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            None => write!(f, "{}", self.left.version()),
            Some(right) => write!(
                f,
                "{}{},{}{}",
                if self.left.is_inclusive() { '[' } else { '(' },
                self.left.version(),
                right.version(),
                if right.is_inclusive() { ']' } else { ')' },
            ),
        }
    }
}
