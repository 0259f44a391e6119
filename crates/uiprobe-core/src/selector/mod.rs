//! Selectors for locating nodes.
//!
//! A [`Selector`] is decided once, at construction time, into one of four
//! kinds, each with its own matcher:
//!
//! - [`Predicate`]: structured conjunction of field clauses
//!   (`{"text": "OK", "clickable": true}`)
//! - [`Shorthand`]: CSS-like strings (`#login`, `.Button`, `[text*=Log]`)
//! - [`PathQuery`]: restricted path syntax (`//Button[@text="Submit"]`)
//! - `Alternatives`: ordered list, the first one with matches wins
//!
//! Strings starting with `/` are path queries, everything else is
//! shorthand. JSON input is dispatched on shape: string, object or array.

pub mod path;
pub mod predicate;
pub mod shorthand;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ApiError;

pub use path::PathQuery;
pub use predicate::{Field, Matcher, Predicate};
pub use shorthand::Shorthand;

#[derive(Debug, Clone)]
pub enum Selector {
    Predicate(Predicate),
    Shorthand(Shorthand),
    Path(PathQuery),
    Alternatives(Vec<Selector>),
}

impl Selector {
    /// Parse a selector string (shorthand or path query).
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        if input.trim_start().starts_with('/') {
            PathQuery::parse(input).map(Selector::Path)
        } else {
            Shorthand::parse(input).map(Selector::Shorthand)
        }
    }

    /// Build a selector from JSON: string, object, or array of those.
    pub fn from_json(value: &Value) -> Result<Self, ApiError> {
        match value {
            Value::String(s) => Selector::parse(s),
            Value::Object(map) => Predicate::from_json(map).map(Selector::Predicate),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(ApiError::invalid_selector("[]", "no alternatives given"));
                }
                items
                    .iter()
                    .map(Selector::from_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Selector::Alternatives)
            }
            other => Err(ApiError::invalid_selector(
                &other.to_string(),
                "expected a string, object or array",
            )),
        }
    }

    /// Parse CLI input: JSON when it looks like JSON, a selector string otherwise.
    pub fn from_input(input: &str) -> Result<Self, ApiError> {
        let trimmed = input.trim_start();
        let looks_like_json = trimmed.starts_with('{')
            || (trimmed.starts_with('[')
                && trimmed[1..].trim_start().starts_with(['{', '[', '"']));
        if looks_like_json {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| ApiError::invalid_selector(input, format!("invalid JSON: {}", e)))?;
            return Selector::from_json(&value);
        }
        Selector::parse(input)
    }

    /// Try each selector in order; the first non-empty result wins.
    pub fn any_of(selectors: impl IntoIterator<Item = Selector>) -> Self {
        Selector::Alternatives(selectors.into_iter().collect())
    }
}

impl FromStr for Selector {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl From<Predicate> for Selector {
    fn from(p: Predicate) -> Self {
        Selector::Predicate(p)
    }
}

impl From<Shorthand> for Selector {
    fn from(s: Shorthand) -> Self {
        Selector::Shorthand(s)
    }
}

impl From<PathQuery> for Selector {
    fn from(q: PathQuery) -> Self {
        Selector::Path(q)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Predicate(p) => write!(f, "{}", p),
            Selector::Shorthand(s) => write!(f, "{}", s),
            Selector::Path(q) => write!(f, "{}", q),
            Selector::Alternatives(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}
