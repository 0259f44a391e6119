//! Hierarchy dump parsing.
//!
//! Turns the XML-like text produced by `uiautomator dump` into a
//! [`Snapshot`]. Real dumps are messy: a shell banner before the root tag,
//! `UI hierchary dumped to: /dev/tty` after it, NUL bytes, and `&` or `<`
//! that were never escaped. [`sanitize`] repairs those before the markup is
//! handed to `quick-xml`.
//!
//! Parsing never fails. Anything unrecoverable (empty input, no root,
//! syntax error, truncated document) yields [`Snapshot::degraded`] with the
//! reason attached.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, warn};

use crate::node::{Bounds, Flag, Node, NodeId};
use crate::snapshot::Snapshot;

/// Parse a raw hierarchy dump into a snapshot.
pub fn parse_hierarchy(raw: &str) -> Snapshot {
    let cleaned = sanitize(raw);
    if cleaned.trim().is_empty() {
        warn!("Hierarchy dump is empty after sanitizing ({} raw bytes)", raw.len());
        return Snapshot::degraded("empty hierarchy dump");
    }

    match build_arena(&cleaned) {
        Ok(nodes) => {
            debug!("Parsed hierarchy with {} nodes", nodes.len());
            Snapshot::from_arena(nodes)
        }
        Err(reason) => {
            warn!("Failed to parse hierarchy dump: {}", reason);
            Snapshot::degraded(reason)
        }
    }
}

/// Repair the quirks of real-world dumps.
///
/// - drops NUL and other control characters (tab, CR and LF are kept)
/// - cuts any preamble before the first `<` and trailer after the last `>`
/// - turns a bare `&` that doesn't start an entity into `&amp;`
/// - escapes `<` and `>` that appear inside quoted attribute values
pub fn sanitize(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();

    let body = match (filtered.find('<'), filtered.rfind('>')) {
        (Some(start), Some(end)) if start < end => &filtered[start..=end],
        _ => return String::new(),
    };

    let mut out = String::with_capacity(body.len() + 16);
    let mut in_tag = false;
    let mut quote: Option<char> = None;

    for (i, c) in body.char_indices() {
        match c {
            '&' => {
                if starts_entity(&body[i..]) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '"' | '\'' if in_tag => {
                match quote {
                    None => quote = Some(c),
                    Some(q) if q == c => quote = None,
                    Some(_) => {}
                }
                out.push(c);
            }
            '<' if quote.is_some() => out.push_str("&lt;"),
            '>' if quote.is_some() => out.push_str("&gt;"),
            '<' => {
                in_tag = true;
                out.push(c);
            }
            '>' => {
                in_tag = false;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Longest entity body we recognize (`#x10FFFF`) plus slack.
const MAX_ENTITY_LEN: usize = 10;

/// True when `s` (which starts with `&`) begins a well-formed entity.
fn starts_entity(s: &str) -> bool {
    let rest = &s.as_bytes()[1..];
    let window = &rest[..rest.len().min(MAX_ENTITY_LEN + 1)];
    let Some(end) = window.iter().position(|b| *b == b';') else {
        return false;
    };
    // Entity names are ASCII; anything else fails the checks below
    let Ok(name) = std::str::from_utf8(&rest[..end]) else {
        return false;
    };
    match name {
        "amp" | "lt" | "gt" | "quot" | "apos" => true,
        _ => {
            if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
            } else if let Some(dec) = name.strip_prefix('#') {
                !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
            } else {
                false
            }
        }
    }
}

/// Walk the markup and lay nodes out in pre-order.
fn build_arena(xml: &str) -> Result<Vec<Node>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes: Vec<Node> = Vec::new();
    // Ids of currently open elements, innermost last
    let mut open: Vec<NodeId> = Vec::new();
    let mut root_closed = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("syntax error at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(tag) => {
                if root_closed {
                    continue;
                }
                let id = push_node(&mut nodes, &open, &tag)?;
                open.push(id);
            }
            Event::Empty(tag) => {
                if root_closed {
                    continue;
                }
                push_node(&mut nodes, &open, &tag)?;
                if open.is_empty() {
                    root_closed = true;
                }
            }
            Event::End(_) => {
                if root_closed {
                    continue;
                }
                open.pop();
                if open.is_empty() {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if nodes.is_empty() {
        return Err("missing root element".to_string());
    }
    if !open.is_empty() {
        return Err(format!(
            "truncated dump: {} element(s) left unclosed",
            open.len()
        ));
    }
    Ok(nodes)
}

/// Append one node for `tag` under the innermost open element.
fn push_node(nodes: &mut Vec<Node>, open: &[NodeId], tag: &BytesStart<'_>) -> Result<NodeId, String> {
    let id = NodeId(nodes.len());
    let tag_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut node = Node::new(id, String::new());
    let mut class_attr: Option<String> = None;
    let mut index_attr: Option<u32> = None;

    for attr in tag.attributes().with_checks(false) {
        let attr = attr.map_err(|e| format!("bad attribute in <{}>: {}", tag_name, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attr.value).into_owned()))
            .into_owned();
        apply_attribute(&mut node, &mut class_attr, &mut index_attr, key, value);
    }

    node.class_name = class_attr.unwrap_or(tag_name);

    match open.last() {
        Some(parent_id) => {
            let parent = &mut nodes[parent_id.0];
            let position = parent.children.len();
            node.parent = Some(*parent_id);
            node.depth = parent.depth + 1;
            node.path = format!("{}.{}", parent.path, position);
            node.index = index_attr.unwrap_or(position as u32);
            parent.children.push(id);
        }
        None => {
            if !nodes.is_empty() {
                return Err("multiple root elements".to_string());
            }
            node.index = index_attr.unwrap_or(0);
        }
    }

    nodes.push(node);
    Ok(id)
}

fn apply_attribute(
    node: &mut Node,
    class_attr: &mut Option<String>,
    index_attr: &mut Option<u32>,
    key: String,
    value: String,
) {
    if let Some(flag) = Flag::from_name(&key) {
        // Anything but a literal "true"/"false" keeps the documented default
        match value.as_str() {
            "true" => node.flags.set(flag, true),
            "false" => node.flags.set(flag, false),
            _ => {}
        }
        return;
    }

    match key.as_str() {
        "class" => *class_attr = Some(value),
        "resource-id" => node.resource_id = value,
        "text" => node.text = value,
        "content-desc" => node.description = value,
        "package" => node.package = value,
        "index" => *index_attr = value.trim().parse().ok(),
        "bounds" => node.bounds = Bounds::parse(&value).unwrap_or_default(),
        _ => {
            node.extras.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PARSE_FAILURE_MARKER;

    const LOGIN: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.example" content-desc="" checkable="false" checked="false" clickable="false" enabled="true" focusable="false" focused="false" scrollable="false" long-clickable="false" password="false" selected="false" visible-to-user="true" bounds="[0,0][1080,2340]">
    <node index="0" text="Welcome" resource-id="com.example:id/title" class="android.widget.TextView" package="com.example" content-desc="" clickable="false" bounds="[48,200][1032,280]" />
    <node index="1" text="" resource-id="com.example:id/password" class="android.widget.EditText" package="com.example" content-desc="Password" focusable="true" focused="true" password="true" bounds="[48,400][1032,520]" />
    <node index="2" text="Log in" resource-id="com.example:id/login" class="android.widget.Button" package="com.example" content-desc="" clickable="true" enabled="false" bounds="[48,600][1032,720]" />
  </node>
</hierarchy>"#;

    #[test]
    fn test_parses_one_node_per_tag_with_verbatim_fields() {
        let snap = parse_hierarchy(LOGIN);
        assert!(!snap.is_degraded());
        assert_eq!(snap.len(), 5);

        let title = snap.node(NodeId(2));
        assert_eq!(title.class_name, "android.widget.TextView");
        assert_eq!(title.text, "Welcome");
        assert_eq!(title.resource_id, "com.example:id/title");
        assert_eq!(title.package, "com.example");
        assert_eq!(title.bounds.to_string(), "[48,200][1032,280]");

        let password = snap.node(NodeId(3));
        assert_eq!(password.description, "Password");
        assert!(password.flags.password);
        assert!(password.flags.focused);
        assert!(password.flags.focusable);

        let login = snap.node(NodeId(4));
        assert!(login.flags.clickable);
        assert!(!login.flags.enabled);
        assert_eq!(login.index, 2);
    }

    #[test]
    fn test_missing_attributes_take_defaults() {
        let snap = parse_hierarchy(r#"<hierarchy><node class="X"/></hierarchy>"#);
        let node = snap.node(NodeId(1));
        assert!(node.flags.enabled);
        assert!(node.flags.visible_to_user);
        assert!(!node.flags.clickable);
        assert!(!node.flags.checked);
        assert_eq!(node.text, "");
        assert_eq!(node.resource_id, "");
        assert_eq!(node.bounds, Bounds::default());
        assert_eq!(node.index, 0);
    }

    #[test]
    fn test_root_is_typed_by_tag_name() {
        let snap = parse_hierarchy(LOGIN);
        assert_eq!(snap.root().class_name, "hierarchy");
        assert_eq!(snap.root().extras.get("rotation").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_links_and_paths() {
        let snap = parse_hierarchy(LOGIN);
        let frame = snap.node(NodeId(1));
        assert_eq!(frame.parent, Some(NodeId::ROOT));
        assert_eq!(frame.children, vec![NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(snap.node(NodeId(4)).path, "0.0.2");
        assert_eq!(snap.node(NodeId(4)).depth, 2);
    }

    #[test]
    fn test_wide_trees_get_distinct_ids() {
        let mut xml = String::from("<hierarchy><node class=\"List\">");
        for i in 0..1500 {
            xml.push_str(&format!("<node class=\"Row\" text=\"row {}\"/>", i));
        }
        xml.push_str("</node></hierarchy>");

        let snap = parse_hierarchy(&xml);
        assert_eq!(snap.len(), 1502);
        let mut paths: Vec<&str> = snap.iter().map(|n| n.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), 1502);
        assert_eq!(snap.node(NodeId(1501)).text, "row 1499");
    }

    #[test]
    fn test_tolerates_preamble_trailer_and_nul_bytes() {
        let raw = format!(
            "WARNING: linker noise\n{}\u{0}UI hierchary dumped to: /dev/tty\n",
            LOGIN.replace("Welcome", "Wel\u{0}come")
        );
        let snap = parse_hierarchy(&raw);
        assert!(!snap.is_degraded(), "{:?}", snap.diagnostic());
        assert_eq!(snap.len(), 5);
        assert_eq!(snap.node(NodeId(2)).text, "Welcome");
    }

    #[test]
    fn test_repairs_bare_ampersands_and_angle_brackets_in_values() {
        let raw = r#"<hierarchy><node class="T" text="Terms & Conditions <beta>" content-desc="a &amp; b"/></hierarchy>"#;
        let snap = parse_hierarchy(raw);
        assert!(!snap.is_degraded(), "{:?}", snap.diagnostic());
        assert_eq!(snap.node(NodeId(1)).text, "Terms & Conditions <beta>");
        assert_eq!(snap.node(NodeId(1)).description, "a & b");
    }

    #[test]
    fn test_sanitize_keeps_valid_entities() {
        assert_eq!(sanitize("<a t=\"&#38;&#x26;&lt;\"/>"), "<a t=\"&#38;&#x26;&lt;\"/>");
        assert_eq!(sanitize("<a t=\"R&D\"/>"), "<a t=\"R&amp;D\"/>");
    }

    #[test]
    fn test_entity_lookahead_is_bounded() {
        // A ';' far past the '&' does not make it an entity
        assert_eq!(
            sanitize("<a t=\"&amp and then some more text;\"/>"),
            "<a t=\"&amp;amp and then some more text;\"/>"
        );

        let text = "Q&A ".repeat(20_000);
        let raw = format!(r#"<hierarchy><node class="T" text="{}"/></hierarchy>;"#, text);
        let snap = parse_hierarchy(&raw);
        assert!(!snap.is_degraded(), "{:?}", snap.diagnostic());
        assert_eq!(snap.node(NodeId(1)).text, text);
    }

    #[test]
    fn test_malformed_bounds_become_zero_rect() {
        let snap = parse_hierarchy(r#"<hierarchy><node class="X" bounds="[1,2]"/></hierarchy>"#);
        assert_eq!(snap.node(NodeId(1)).bounds, Bounds::default());
    }

    #[test]
    fn test_truncated_dump_degrades() {
        let snap = parse_hierarchy(r#"<hierarchy><node text="x""#);
        assert_eq!(snap.len(), 1);
        assert!(snap.is_degraded());
        assert!(snap.root().text.contains(PARSE_FAILURE_MARKER));
    }

    #[test]
    fn test_unclosed_root_degrades() {
        let snap = parse_hierarchy(r#"<hierarchy><node class="A"></node>"#);
        assert!(snap.is_degraded());
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_missing_root_and_empty_input_degrade() {
        for raw in ["", "   ", "no markup here", "\u{0}\u{0}"] {
            let snap = parse_hierarchy(raw);
            assert!(snap.is_degraded(), "input {:?} should degrade", raw);
            assert_eq!(snap.len(), 1);
        }
    }

    #[test]
    fn test_mismatched_end_tag_degrades() {
        let snap = parse_hierarchy("<hierarchy><node></nope></hierarchy>");
        assert!(snap.is_degraded());
    }

    #[test]
    fn test_unknown_attributes_are_kept_as_extras() {
        let snap = parse_hierarchy(r#"<hierarchy><node class="X" hint="Email" drawing-order="3"/></hierarchy>"#);
        let node = snap.node(NodeId(1));
        assert_eq!(node.extras.get("hint").map(String::as_str), Some("Email"));
        assert_eq!(node.extras.get("drawing-order").map(String::as_str), Some("3"));
    }
}
