//! Restricted path queries.
//!
//! Grammar, one or more steps:
//!
//! ```text
//! query     = step+
//! step      = ("//" | "/") name ("[" predicate "]")?
//! name      = "*" | <class substring>
//! predicate = "@" attr "=" quoted | <positive integer>
//! attr      = "text" | "resource-id" | "content-desc" | "clickable"
//! ```
//!
//! `//` searches every descendant of the context node, `/` only its direct
//! children. A name other than `*` matches when it is a substring of the
//! node's class. `[n]` is 1-based and selects nodes whose `index`
//! attribute equals `n - 1`, mirroring XPath positions on top of the
//! 0-based dump index.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ApiError;
use crate::node::{Node, NodeId};
use crate::selector::shorthand::unquote;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAttr {
    Text,
    ResourceId,
    ContentDesc,
    Clickable,
}

impl PathAttr {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(PathAttr::Text),
            "resource-id" => Some(PathAttr::ResourceId),
            "content-desc" => Some(PathAttr::ContentDesc),
            "clickable" => Some(PathAttr::Clickable),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            PathAttr::Text => "text",
            PathAttr::ResourceId => "resource-id",
            PathAttr::ContentDesc => "content-desc",
            PathAttr::Clickable => "clickable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPredicate {
    Attr { attr: PathAttr, value: String },
    /// 1-based position as written in the query.
    Position(u32),
}

impl PathPredicate {
    fn matches(&self, node: &Node) -> bool {
        match self {
            PathPredicate::Attr { attr, value } => match attr {
                PathAttr::Text => node.text == *value,
                PathAttr::ResourceId => node.resource_id == *value,
                PathAttr::ContentDesc => node.description == *value,
                PathAttr::Clickable => node.flags.clickable.to_string() == *value,
            },
            PathPredicate::Position(n) => node.index == n - 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    /// None for `*`.
    pub name: Option<String>,
    pub predicate: Option<PathPredicate>,
}

impl Step {
    fn matches(&self, node: &Node) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |name| node.class_name.contains(name));
        name_ok && self.predicate.as_ref().map_or(true, |p| p.matches(node))
    }
}

/// A parsed path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    source: String,
    steps: Vec<Step>,
}

impl PathQuery {
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let source = input.trim();
        let mut rest = source;
        let mut steps = Vec::new();

        if rest.is_empty() {
            return Err(ApiError::invalid_selector(input, "empty path query"));
        }

        while !rest.is_empty() {
            let (axis, after_axis) = if let Some(r) = rest.strip_prefix("//") {
                (Axis::Descendant, r)
            } else if let Some(r) = rest.strip_prefix('/') {
                (Axis::Child, r)
            } else {
                return Err(ApiError::invalid_selector(
                    input,
                    format!("expected '/' or '//' at '{}'", rest),
                ));
            };

            let name_end = after_axis.find(['[', '/']).unwrap_or(after_axis.len());
            let name = after_axis[..name_end].trim();
            if name.is_empty() {
                return Err(ApiError::invalid_selector(input, "missing element name"));
            }
            rest = &after_axis[name_end..];

            let predicate = if let Some(body_start) = rest.strip_prefix('[') {
                let close = find_closing_bracket(body_start)
                    .ok_or_else(|| ApiError::invalid_selector(input, "unterminated '['"))?;
                let predicate = parse_predicate(input, &body_start[..close])?;
                rest = &body_start[close + 1..];
                Some(predicate)
            } else {
                None
            };

            steps.push(Step {
                axis,
                name: (name != "*").then(|| name.to_string()),
                predicate,
            });
        }

        Ok(Self {
            source: source.to_string(),
            steps,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Evaluate from `context`, returning matches in pre-order.
    pub fn evaluate(&self, snapshot: &Snapshot, context: NodeId) -> Vec<NodeId> {
        let mut current: BTreeSet<NodeId> = BTreeSet::from([context]);

        for step in &self.steps {
            let mut next = BTreeSet::new();
            for ctx in &current {
                match step.axis {
                    Axis::Child => next.extend(
                        snapshot
                            .children(*ctx)
                            .filter(|n| step.matches(n))
                            .map(|n| n.id),
                    ),
                    Axis::Descendant => next.extend(
                        snapshot
                            .descendants(*ctx)
                            .filter(|n| step.matches(n))
                            .map(|n| n.id),
                    ),
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            current = next;
        }

        // Ids are pre-order positions, so the sorted set is document order
        current.into_iter().collect()
    }
}

/// Index of the `]` closing a predicate body, skipping quoted text.
fn find_closing_bracket(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(input: &str, body: &str) -> Result<PathPredicate, ApiError> {
    let body = body.trim();

    if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        let n: u32 = body
            .parse()
            .map_err(|_| ApiError::invalid_selector(input, "position out of range"))?;
        if n == 0 {
            return Err(ApiError::invalid_selector(input, "positions start at 1"));
        }
        return Ok(PathPredicate::Position(n));
    }

    let attr_expr = body.strip_prefix('@').ok_or_else(|| {
        ApiError::invalid_selector(input, format!("unsupported predicate '[{}]'", body))
    })?;
    let (name, value) = attr_expr.split_once('=').ok_or_else(|| {
        ApiError::invalid_selector(input, format!("predicate '[{}]' needs '='", body))
    })?;
    let attr = PathAttr::from_name(name.trim()).ok_or_else(|| {
        ApiError::invalid_selector(
            input,
            format!(
                "unsupported attribute '@{}' (use text, resource-id, content-desc or clickable)",
                name.trim()
            ),
        )
    })?;

    let value = value.trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if !quoted {
        return Err(ApiError::invalid_selector(
            input,
            format!("value for '@{}' must be quoted", attr.name()),
        ));
    }

    Ok(PathPredicate::Attr {
        attr,
        value: unquote(value).to_string(),
    })
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_hierarchy;

    const FORM: &str = r#"<hierarchy>
  <node index="0" class="android.widget.FrameLayout">
    <node index="0" class="android.widget.Button" text="Cancel" clickable="true"/>
    <node index="1" class="android.widget.LinearLayout">
      <node index="0" class="android.widget.ScrollView">
        <node index="0" class="android.widget.LinearLayout">
          <node index="0" class="android.widget.Button" text="Submit" resource-id="com.app:id/submit" clickable="true"/>
          <node index="1" class="android.widget.TextView" text="Terms" content-desc="terms"/>
        </node>
      </node>
    </node>
  </node>
</hierarchy>"#;

    fn run(query: &str) -> Vec<NodeId> {
        let snap = parse_hierarchy(FORM);
        PathQuery::parse(query).unwrap().evaluate(&snap, NodeId::ROOT)
    }

    #[test]
    fn test_descendant_search_finds_deeply_nested_match() {
        assert_eq!(run("//Button[@text=\"Submit\"]"), vec![NodeId(6)]);
        assert_eq!(run("//Button"), vec![NodeId(2), NodeId(6)]);
    }

    #[test]
    fn test_child_axis_only_looks_one_level_down() {
        assert_eq!(run("/FrameLayout"), vec![NodeId(1)]);
        assert!(run("/Button").is_empty());
        assert_eq!(run("/FrameLayout/Button"), vec![NodeId(2)]);
    }

    #[test]
    fn test_wildcard_matches_any_class() {
        let all = run("//*");
        assert_eq!(all.len(), 7);
        assert_eq!(all.first(), Some(&NodeId(1)));
    }

    #[test]
    fn test_mixed_axes_chain_and_dedupe() {
        // Both LinearLayouts contain the Submit button somewhere below them
        assert_eq!(run("//LinearLayout//Button"), vec![NodeId(6)]);
        assert_eq!(run("//LinearLayout/*"), vec![NodeId(4), NodeId(6), NodeId(7)]);
    }

    #[test]
    fn test_attribute_predicates() {
        assert_eq!(run("//*[@resource-id='com.app:id/submit']"), vec![NodeId(6)]);
        assert_eq!(run("//*[@content-desc=\"terms\"]"), vec![NodeId(7)]);
        assert_eq!(run("//*[@clickable=\"true\"]"), vec![NodeId(2), NodeId(6)]);
    }

    #[test]
    fn test_position_predicate_is_one_based() {
        assert_eq!(run("//Button[1]"), vec![NodeId(2), NodeId(6)]);
        assert_eq!(run("//TextView[2]"), vec![NodeId(7)]);
        assert!(run("//TextView[1]").is_empty());
    }

    #[test]
    fn test_brackets_inside_quotes_do_not_close_predicate() {
        let q = PathQuery::parse("//*[@text=\"a]b\"]").unwrap();
        assert_eq!(
            q.steps()[0].predicate,
            Some(PathPredicate::Attr {
                attr: PathAttr::Text,
                value: "a]b".into()
            })
        );
    }

    #[test]
    fn test_rejects_malformed_queries() {
        for bad in [
            "",
            "Button",
            "//",
            "//Button[",
            "//Button[@text=Submit]",
            "//Button[@class=\"x\"]",
            "//Button[0]",
            "//Button[last()]",
        ] {
            assert!(PathQuery::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_display_is_source_text() {
        assert_eq!(
            PathQuery::parse(" //Button[1] ").unwrap().to_string(),
            "//Button[1]"
        );
    }
}
