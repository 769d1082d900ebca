//! LDAP-style filter expressions used by requirements.
//!
//! Supported syntax: `(attr=value)`, `(attr~=value)`, `(attr>=value)`,
//! `(attr<=value)`, `(attr=*)`, substrings such as `(attr=a*b*)`, and the
//! composites `(&...)`, `(|...)` and `(!...)`. A backslash escapes the next
//! character.

use std::fmt;
use std::str::FromStr;

use modwire_version::{Comparator, Operator, Version};
use thiserror::Error;

use crate::resource::{AttributeValue, Attributes};

/// Error produced when a filter string cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid filter \"{filter}\" at position {position}: {reason}")]
pub struct FilterError {
    pub filter: String,
    pub position: usize,
    pub reason: String,
}

/// Comparison operator of a simple filter item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Equal,
    Approx,
    GreaterEqual,
    LessEqual,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "=",
            FilterOp::Approx => "~=",
            FilterOp::GreaterEqual => ">=",
            FilterOp::LessEqual => "<=",
        }
    }

    /// Version and numeric comparison operator. `~=` is plain equality for non-strings.
    fn operator(&self) -> Operator {
        match self {
            FilterOp::Equal | FilterOp::Approx => Operator::Equal,
            FilterOp::GreaterEqual => Operator::GreaterThanOrEqual,
            FilterOp::LessEqual => Operator::LessThanOrEqual,
        }
    }
}

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        attribute: String,
        op: FilterOp,
        value: String,
    },
    Present(String),
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl Filter {
    /// Parse a filter string
    pub fn parse(filter: &str) -> Result<Self, FilterError> {
        let mut parser = Parser {
            source: filter,
            chars: filter.chars().collect(),
            pos: 0,
        };
        parser.skip_whitespace();
        let parsed = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(parsed)
    }

    /// Evaluate the filter against an attribute map
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attributes)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attributes)),
            Filter::Not(inner) => !inner.matches(attributes),
            Filter::Present(attribute) => lookup(attributes, attribute).is_some(),
            Filter::Compare {
                attribute,
                op,
                value,
            } => lookup(attributes, attribute)
                .map_or(false, |actual| compare(actual, *op, value)),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => lookup(attributes, attribute).map_or(false, |actual| {
                substring_matches(actual, initial.as_deref(), any, last.as_deref())
            }),
        }
    }

    /// Lowercased names of every attribute the filter references
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_attribute_names(&mut names);
        names
    }

    fn collect_attribute_names(&self, names: &mut Vec<String>) {
        let name = match self {
            Filter::And(items) | Filter::Or(items) => {
                for item in items {
                    item.collect_attribute_names(names);
                }
                return;
            }
            Filter::Not(inner) => return inner.collect_attribute_names(names),
            Filter::Present(attribute) => attribute,
            Filter::Compare { attribute, .. } => attribute,
            Filter::Substring { attribute, .. } => attribute,
        };
        let lower = name.to_lowercase();
        if !names.contains(&lower) {
            names.push(lower);
        }
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                let op = if matches!(self, Filter::And(_)) { '&' } else { '|' };
                write!(f, "({}", op)?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Present(attribute) => write!(f, "({}=*)", attribute),
            Filter::Compare {
                attribute,
                op,
                value,
            } => write!(f, "({}{}{})", attribute, op.as_str(), escape(value)),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => {
                write!(f, "({}=", attribute)?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape(last))?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Escape the characters that are special inside a filter value
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn lookup<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn compare(actual: &AttributeValue, op: FilterOp, literal: &str) -> bool {
    match actual {
        AttributeValue::List(items) => items.iter().any(|item| compare(item, op, literal)),
        AttributeValue::String(s) => match op {
            FilterOp::Equal => s == literal,
            FilterOp::Approx => normalize_approx(s) == normalize_approx(literal),
            FilterOp::GreaterEqual => s.as_str() >= literal,
            FilterOp::LessEqual => s.as_str() <= literal,
        },
        AttributeValue::Long(n) => match literal.trim().parse::<i64>() {
            Ok(lit) => op.operator().accepts(n.cmp(&lit)),
            Err(_) => false,
        },
        AttributeValue::Double(d) => match literal.trim().parse::<f64>() {
            Ok(lit) => d.partial_cmp(&lit).map_or(false, |ord| op.operator().accepts(ord)),
            Err(_) => false,
        },
        AttributeValue::Version(v) => match Version::parse(literal) {
            Ok(lit) => Comparator::compare_versions(v, op.operator(), &lit),
            Err(_) => false,
        },
    }
}

fn normalize_approx(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_matches(
    actual: &AttributeValue,
    initial: Option<&str>,
    any: &[String],
    last: Option<&str>,
) -> bool {
    let s = match actual {
        AttributeValue::List(items) => {
            return items
                .iter()
                .any(|item| substring_matches(item, initial, any, last))
        }
        AttributeValue::String(s) => s.as_str(),
        _ => return false,
    };

    let mut rest = s;
    if let Some(initial) = initial {
        match rest.strip_prefix(initial) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for part in any {
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(last),
        None => true,
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

/// Piece of a raw filter value: literal text or an unescaped `*`
enum ValuePart {
    Text(String),
    Star,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> FilterError {
        FilterError {
            filter: self.source.to_string(),
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_whitespace();
                let inner = self.parse_filter()?;
                self.skip_whitespace();
                Filter::Not(Box::new(inner))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        while self.peek() == Some('(') {
            items.push(self.parse_filter()?);
            self.skip_whitespace();
        }
        if items.is_empty() {
            return Err(self.error("composite filter without operands"));
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attribute: String = self.chars[start..self.pos].iter().collect::<String>().trim().to_string();
        if attribute.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), _) => {
                self.pos += 1;
                FilterOp::Equal
            }
            (Some('~'), Some('=')) => {
                self.pos += 2;
                FilterOp::Approx
            }
            (Some('>'), Some('=')) => {
                self.pos += 2;
                FilterOp::GreaterEqual
            }
            (Some('<'), Some('=')) => {
                self.pos += 2;
                FilterOp::LessEqual
            }
            _ => return Err(self.error("invalid operator")),
        };

        let parts = self.parse_value()?;

        if op != FilterOp::Equal || !parts.iter().any(|p| matches!(p, ValuePart::Star)) {
            let value = parts
                .into_iter()
                .map(|p| match p {
                    ValuePart::Text(t) => t,
                    ValuePart::Star => "*".to_string(),
                })
                .collect();
            return Ok(Filter::Compare {
                attribute,
                op,
                value,
            });
        }

        if parts.len() == 1 {
            return Ok(Filter::Present(attribute));
        }

        let mut initial = None;
        let mut any = Vec::new();
        let mut last = None;
        let count = parts.len();
        for (idx, part) in parts.into_iter().enumerate() {
            if let ValuePart::Text(text) = part {
                if idx == 0 {
                    initial = Some(text);
                } else if idx == count - 1 {
                    last = Some(text);
                } else {
                    any.push(text);
                }
            }
        }

        Ok(Filter::Substring {
            attribute,
            initial,
            any,
            last,
        })
    }

    fn parse_value(&mut self) -> Result<Vec<ValuePart>, FilterError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated filter value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            text.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("dangling escape")),
                    }
                }
                Some('*') => {
                    self.pos += 1;
                    if !text.is_empty() {
                        parts.push(ValuePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(ValuePart::Star);
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(ValuePart::Text(text));
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: Vec<(&str, AttributeValue)>) -> Attributes {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn version(s: &str) -> AttributeValue {
        AttributeValue::Version(Version::parse(s).unwrap())
    }

    #[test]
    fn test_parse_simple() {
        let filter = Filter::parse("(name=foo)").unwrap();
        assert_eq!(
            filter,
            Filter::Compare {
                attribute: "name".to_string(),
                op: FilterOp::Equal,
                value: "foo".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("").is_err());
        assert!(Filter::parse("name=foo").is_err());
        assert!(Filter::parse("(name=foo").is_err());
        assert!(Filter::parse("(&)").is_err());
        assert!(Filter::parse("(=foo)").is_err());
        assert!(Filter::parse("(name>foo)").is_err());
        assert!(Filter::parse("(name=foo))").is_err());
        assert!(Filter::parse("(name=fo\\").is_err());
    }

    #[test]
    fn test_error_position() {
        let err = Filter::parse("(a=b)(c=d)").unwrap_err();
        assert_eq!(err.position, 5);
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_version_comparison() {
        let a = attrs(vec![("version", version("1.5.0"))]);
        assert!(Filter::parse("(version>=1.0)").unwrap().matches(&a));
        assert!(!Filter::parse("(version>=2.0)").unwrap().matches(&a));
        assert!(Filter::parse("(&(version>=1.0.0)(!(version>=2.0.0)))").unwrap().matches(&a));
        assert!(Filter::parse("(version=1.5)").unwrap().matches(&a));
        assert!(!Filter::parse("(version>=notaversion)").unwrap().matches(&a));
    }

    #[test]
    fn test_version_operators() {
        assert_eq!(FilterOp::Approx.operator(), Operator::Equal);
        assert_eq!(FilterOp::LessEqual.operator(), Operator::LessThanOrEqual);

        let a = attrs(vec![("version", version("1.5.0"))]);
        assert!(Filter::parse("(version~=1.5)").unwrap().matches(&a));
        assert!(Filter::parse("(version<=1.5.0.a)").unwrap().matches(&a));
        assert!(!Filter::parse("(version<=1.4.9)").unwrap().matches(&a));
        assert!(!Filter::parse("(version=1.5.0.a)").unwrap().matches(&a));
    }

    #[test]
    fn test_numeric_comparison() {
        let a = attrs(vec![("size", AttributeValue::Long(10)), ("ratio", AttributeValue::Double(0.5))]);
        assert!(Filter::parse("(size>=9)").unwrap().matches(&a));
        assert!(Filter::parse("(size<= 10)").unwrap().matches(&a));
        assert!(!Filter::parse("(size=abc)").unwrap().matches(&a));
        assert!(Filter::parse("(ratio<=0.75)").unwrap().matches(&a));
    }

    #[test]
    fn test_case_insensitive_keys() {
        let a = attrs(vec![("Osgi.Wiring.Package", AttributeValue::from("com.acme"))]);
        assert!(Filter::parse("(osgi.wiring.package=com.acme)").unwrap().matches(&a));
        assert!(!Filter::parse("(osgi.wiring.package=COM.ACME)").unwrap().matches(&a));
        assert!(Filter::parse("(osgi.wiring.package~= COM.acme )").unwrap().matches(&a));
    }

    #[test]
    fn test_presence_and_substring() {
        let a = attrs(vec![("name", AttributeValue::from("org.example.core"))]);
        assert!(Filter::parse("(name=*)").unwrap().matches(&a));
        assert!(!Filter::parse("(other=*)").unwrap().matches(&a));
        assert!(Filter::parse("(name=org.*)").unwrap().matches(&a));
        assert!(Filter::parse("(name=*core)").unwrap().matches(&a));
        assert!(Filter::parse("(name=org*ample*re)").unwrap().matches(&a));
        assert!(!Filter::parse("(name=org*zzz*)").unwrap().matches(&a));
    }

    #[test]
    fn test_escapes() {
        let a = attrs(vec![("name", AttributeValue::from("a*(b)"))]);
        assert!(Filter::parse("(name=a\\*\\(b\\))").unwrap().matches(&a));
        let f = Filter::parse("(name=a\\*\\(b\\))").unwrap();
        assert_eq!(f.to_string(), "(name=a\\*\\(b\\))");
    }

    #[test]
    fn test_lists_match_any() {
        let a = attrs(vec![("tags", AttributeValue::from(vec!["x", "y"]))]);
        assert!(Filter::parse("(tags=y)").unwrap().matches(&a));
        assert!(!Filter::parse("(tags=z)").unwrap().matches(&a));
    }

    #[test]
    fn test_composites() {
        let a = attrs(vec![
            ("name", AttributeValue::from("foo")),
            ("version", version("1.0")),
        ]);
        assert!(Filter::parse("(|(name=bar)(name=foo))").unwrap().matches(&a));
        assert!(!Filter::parse("(&(name=foo)(version>=2))").unwrap().matches(&a));
        assert!(Filter::parse("( ! (name=bar) )").unwrap().matches(&a));
    }

    #[test]
    fn test_attribute_names() {
        let f = Filter::parse("(&(Name=foo)(|(version>=1)(name=bar))(!(x=*)))").unwrap();
        assert_eq!(f.attribute_names(), vec!["name", "version", "x"]);
    }
}
