//! Typed attribute values

use std::fmt;

use indexmap::IndexMap;
use modwire_version::Version;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Attribute map of a capability or requirement, in declaration order
pub type Attributes = IndexMap<String, AttributeValue>;

/// Directive map of a capability or requirement, in declaration order
pub type Directives = IndexMap<String, String>;

/// Value of a capability attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Long(i64),
    Double(f64),
    Version(Version),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            AttributeValue::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Name of the value type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "String",
            AttributeValue::Long(_) => "Long",
            AttributeValue::Double(_) => "Double",
            AttributeValue::Version(_) => "Version",
            AttributeValue::List(_) => "List",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<Version> for AttributeValue {
    fn from(value: Version) -> Self {
        AttributeValue::Version(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Long(n) => write!(f, "{}", n),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Version(v) => write!(f, "{}", v),
            AttributeValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::String(s) => serializer.serialize_str(s),
            AttributeValue::Long(n) => serializer.serialize_i64(*n),
            AttributeValue::Double(d) => serializer.serialize_f64(*d),
            AttributeValue::Version(v) => serializer.collect_str(v),
            AttributeValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(AttributeValue::from("x").as_str(), Some("x"));
        assert_eq!(AttributeValue::from(3i64).as_long(), Some(3));
        assert_eq!(
            AttributeValue::from(Version::new(1, 2, 0)).as_version(),
            Some(&Version::new(1, 2, 0))
        );
        assert_eq!(AttributeValue::from(vec!["a", "b"]).type_name(), "List");
    }

    #[test]
    fn test_display_and_json() {
        let list = AttributeValue::from(vec![Version::new(1, 0, 0), Version::new(2, 0, 0)]);
        assert_eq!(list.to_string(), "1.0.0,2.0.0");
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            serde_json::json!(["1.0.0", "2.0.0"])
        );
    }
}
