//! Version handling for module resolution.
//!
//! Versions have the form `major[.minor[.micro[.qualifier]]]`. Numeric parts
//! compare numerically, the qualifier compares as a string and an empty
//! qualifier sorts before any other. Ranges use interval notation
//! (`[1.0,2.0)`) or a bare version meaning "at least this version".

mod bound;
mod comparator;
mod operator;
mod range;
mod version;

pub use bound::Bound;
pub use comparator::Comparator;
pub use operator::{InvalidOperatorError, Operator};
pub use range::VersionRange;
pub use version::{Version, VersionError};
