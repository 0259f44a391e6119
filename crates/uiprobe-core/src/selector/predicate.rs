//! Structured predicate selectors.
//!
//! A predicate is a conjunction of `(field, matcher)` clauses. A node
//! matches when every clause matches; an empty predicate matches every
//! node.

use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::node::{Flag, Node};

/// Which node attribute a clause inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Text,
    Description,
    /// Case-insensitive substring of text or description.
    Contains,
    /// Exact id, or the `<name>` part of `...:id/<name>`.
    ResourceId,
    ClassName,
    Flag(Flag),
    Index,
    /// The raw `[x1,y1][x2,y2]` encoding.
    Bounds,
    Package,
    /// Any other dump attribute, looked up in the node's extras.
    Other(String),
}

impl Field {
    /// Resolve a field name, accepting camelCase and dump spellings.
    pub fn from_name(name: &str) -> Field {
        if let Some(flag) = Flag::from_name(name) {
            return Field::Flag(flag);
        }
        match name {
            "text" => Field::Text,
            "description" | "desc" | "contentDesc" | "content-desc" => Field::Description,
            "contains" | "textContains" => Field::Contains,
            "resourceId" | "resource-id" | "id" => Field::ResourceId,
            "className" | "class" => Field::ClassName,
            "index" => Field::Index,
            "bounds" => Field::Bounds,
            "package" => Field::Package,
            other => Field::Other(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Field::Text => "text",
            Field::Description => "description",
            Field::Contains => "contains",
            Field::ResourceId => "resourceId",
            Field::ClassName => "className",
            Field::Flag(flag) => flag.attr_name(),
            Field::Index => "index",
            Field::Bounds => "bounds",
            Field::Package => "package",
            Field::Other(name) => name,
        }
    }
}

/// How a clause compares the field's value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Regex(Regex),
    Bool(bool),
}

impl Matcher {
    /// Compile a regex matcher.
    pub fn regex(pattern: &str) -> Result<Self, ApiError> {
        Regex::new(pattern)
            .map(Matcher::Regex)
            .map_err(|e| ApiError::invalid_selector(pattern, format!("invalid regex: {}", e)))
    }

    /// Compare against a plain string value.
    ///
    /// Booleans compare against the stringified form, so `Bool(true)`
    /// matches the value `"true"`.
    fn matches_str(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(expected) => value == expected,
            Matcher::Regex(re) => re.is_match(value),
            Matcher::Bool(b) => value == if *b { "true" } else { "false" },
        }
    }
}

impl From<&str> for Matcher {
    fn from(s: &str) -> Self {
        Matcher::Exact(s.to_string())
    }
}

impl From<String> for Matcher {
    fn from(s: String) -> Self {
        Matcher::Exact(s)
    }
}

impl From<bool> for Matcher {
    fn from(b: bool) -> Self {
        Matcher::Bool(b)
    }
}

impl From<Regex> for Matcher {
    fn from(re: Regex) -> Self {
        Matcher::Regex(re)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(s) => write!(f, "{:?}", s),
            Matcher::Regex(re) => write!(f, "/{}/", re.as_str()),
            Matcher::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A conjunction of field clauses.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    clauses: Vec<(Field, Matcher)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause.
    #[must_use]
    pub fn with(mut self, field: Field, matcher: impl Into<Matcher>) -> Self {
        self.clauses.push((field, matcher.into()));
        self
    }

    #[must_use]
    pub fn text(self, matcher: impl Into<Matcher>) -> Self {
        self.with(Field::Text, matcher)
    }

    #[must_use]
    pub fn description(self, matcher: impl Into<Matcher>) -> Self {
        self.with(Field::Description, matcher)
    }

    #[must_use]
    pub fn contains(self, needle: impl Into<String>) -> Self {
        self.with(Field::Contains, Matcher::Exact(needle.into()))
    }

    #[must_use]
    pub fn resource_id(self, matcher: impl Into<Matcher>) -> Self {
        self.with(Field::ResourceId, matcher)
    }

    #[must_use]
    pub fn class_name(self, matcher: impl Into<Matcher>) -> Self {
        self.with(Field::ClassName, matcher)
    }

    #[must_use]
    pub fn flag(self, flag: Flag, value: bool) -> Self {
        self.with(Field::Flag(flag), value)
    }

    #[must_use]
    pub fn package(self, matcher: impl Into<Matcher>) -> Self {
        self.with(Field::Package, matcher)
    }

    pub fn clauses(&self) -> &[(Field, Matcher)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Build from a JSON object such as `{"text": "OK", "clickable": true}`.
    ///
    /// Values: string → exact, bool → boolean, number → exact string,
    /// `{"regex": "..."}` → regex.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, ApiError> {
        let mut predicate = Predicate::new();
        for (key, value) in map {
            let matcher = match value {
                Value::String(s) => Matcher::Exact(s.clone()),
                Value::Bool(b) => Matcher::Bool(*b),
                Value::Number(n) => Matcher::Exact(n.to_string()),
                Value::Object(inner) => match inner.get("regex") {
                    Some(Value::String(pattern)) => Matcher::regex(pattern)?,
                    _ => {
                        return Err(ApiError::invalid_selector(
                            &value.to_string(),
                            format!("field '{}' expects {{\"regex\": \"...\"}}", key),
                        ))
                    }
                },
                _ => {
                    return Err(ApiError::invalid_selector(
                        &value.to_string(),
                        format!("unsupported value for field '{}'", key),
                    ))
                }
            };
            predicate.clauses.push((Field::from_name(key), matcher));
        }
        Ok(predicate)
    }

    /// True when every clause matches `node`.
    pub fn matches(&self, node: &Node) -> bool {
        self.clauses
            .iter()
            .all(|(field, matcher)| clause_matches(field, matcher, node))
    }
}

fn clause_matches(field: &Field, matcher: &Matcher, node: &Node) -> bool {
    match field {
        Field::Text => matcher.matches_str(&node.text),
        Field::Description => matcher.matches_str(&node.description),
        Field::Contains => match matcher {
            Matcher::Exact(needle) => {
                let needle = needle.to_lowercase();
                node.text.to_lowercase().contains(&needle)
                    || node.description.to_lowercase().contains(&needle)
            }
            Matcher::Regex(re) => re.is_match(&node.text) || re.is_match(&node.description),
            Matcher::Bool(_) => false,
        },
        Field::ResourceId => match matcher {
            Matcher::Exact(id) => resource_id_matches(&node.resource_id, id),
            other => other.matches_str(&node.resource_id),
        },
        Field::ClassName => matcher.matches_str(&node.class_name),
        Field::Flag(flag) => match matcher {
            Matcher::Bool(expected) => node.flag(*flag) == *expected,
            other => other.matches_str(&node.flag(*flag).to_string()),
        },
        Field::Index => matcher.matches_str(&node.index.to_string()),
        Field::Bounds => matcher.matches_str(&node.bounds.to_string()),
        Field::Package => matcher.matches_str(&node.package),
        Field::Other(name) => node
            .extras
            .get(name)
            .is_some_and(|value| matcher.matches_str(value)),
    }
}

/// Exact id, or a short name matching the `:id/<name>` suffix.
pub(crate) fn resource_id_matches(actual: &str, wanted: &str) -> bool {
    if actual == wanted {
        return true;
    }
    actual
        .strip_suffix(wanted)
        .is_some_and(|prefix| prefix.ends_with(":id/"))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, matcher)) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name(), matcher)?;
        }
        write!(f, "}}")
    }
}
