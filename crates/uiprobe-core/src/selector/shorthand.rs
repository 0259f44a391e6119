//! CSS-like shorthand selectors.
//!
//! | Form | Meaning |
//! |------|---------|
//! | `#login` | resource id equals `login` or ends with `:id/login` |
//! | `.Button` | class contains `Button` |
//! | `[text=OK]` | attribute equals value |
//! | `[text*=Log]` | attribute contains value |
//! | `[hint]` | attribute present and non-empty |
//! | `Settings` | text or description equals the string |
//!
//! Attribute names accept dump spellings (`resource-id`, `content-desc`)
//! and camelCase (`resourceId`, `contentDesc`). Values may be quoted.

use std::fmt;

use crate::error::ApiError;
use crate::node::Node;
use crate::selector::predicate::resource_id_matches;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shorthand {
    Id(String),
    Class(String),
    AttrEquals { name: String, value: String },
    AttrContains { name: String, value: String },
    AttrExists(String),
    Text(String),
}

impl Shorthand {
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ApiError::invalid_selector(input, "empty selector"));
        }

        if let Some(id) = s.strip_prefix('#') {
            if id.is_empty() {
                return Err(ApiError::invalid_selector(input, "'#' needs an id"));
            }
            return Ok(Shorthand::Id(id.to_string()));
        }

        if let Some(class) = s.strip_prefix('.') {
            if class.is_empty() {
                return Err(ApiError::invalid_selector(input, "'.' needs a class name"));
            }
            return Ok(Shorthand::Class(class.to_string()));
        }

        if let Some(body) = s.strip_prefix('[') {
            let body = body
                .strip_suffix(']')
                .ok_or_else(|| ApiError::invalid_selector(input, "unterminated '['"))?;
            return parse_attribute(input, body);
        }

        Ok(Shorthand::Text(s.to_string()))
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Shorthand::Id(id) => resource_id_matches(&node.resource_id, id),
            Shorthand::Class(class) => node.class_name.contains(class.as_str()),
            Shorthand::AttrEquals { name, value } => {
                node.attribute(name).is_some_and(|v| v == *value)
            }
            Shorthand::AttrContains { name, value } => node
                .attribute(name)
                .is_some_and(|v| v.contains(value.as_str())),
            Shorthand::AttrExists(name) => node.attribute(name).is_some_and(|v| !v.is_empty()),
            Shorthand::Text(text) => node.text == *text || node.description == *text,
        }
    }
}

fn parse_attribute(input: &str, body: &str) -> Result<Shorthand, ApiError> {
    if let Some((name, value)) = body.split_once("*=") {
        let name = attribute_name(input, name)?;
        return Ok(Shorthand::AttrContains {
            name,
            value: unquote(value).to_string(),
        });
    }
    if let Some((name, value)) = body.split_once('=') {
        let name = attribute_name(input, name)?;
        return Ok(Shorthand::AttrEquals {
            name,
            value: unquote(value).to_string(),
        });
    }
    Ok(Shorthand::AttrExists(attribute_name(input, body)?))
}

fn attribute_name(input: &str, raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::invalid_selector(input, "missing attribute name"));
    }
    if name.contains(|c: char| c.is_whitespace() || c == '[' || c == ']') {
        return Err(ApiError::invalid_selector(
            input,
            format!("bad attribute name '{}'", name),
        ));
    }
    Ok(name.to_string())
}

/// Strip one layer of matching single or double quotes.
pub(crate) fn unquote(raw: &str) -> &str {
    let v = raw.trim();
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

impl fmt::Display for Shorthand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shorthand::Id(id) => write!(f, "#{}", id),
            Shorthand::Class(class) => write!(f, ".{}", class),
            Shorthand::AttrEquals { name, value } => write!(f, "[{}=\"{}\"]", name, value),
            Shorthand::AttrContains { name, value } => write!(f, "[{}*=\"{}\"]", name, value),
            Shorthand::AttrExists(name) => write!(f, "[{}]", name),
            Shorthand::Text(text) => write!(f, "{}", text),
        }
    }
}
