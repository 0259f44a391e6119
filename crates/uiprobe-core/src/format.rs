//! Compact text rendering of a snapshot.
//!
//! One line per node, indented by depth:
//!
//! ```text
//! n0 [hierarchy]
//!   n1 [FrameLayout] (bounds: [0,0][1080,1920])
//!     n2 [Button] #login "Log in" (bounds: [40,800][1040,900], clickable)
//! ```
//!
//! Text longer than the configured display width is cut with `…`. Widths
//! are measured in terminal columns, so wide CJK text is cut earlier than
//! ASCII of the same length.

use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::node::{Flag, Node};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Maximum display width of text and description values.
    pub max_text_width: usize,
    /// Skip nodes that are not visible (and their subtrees).
    pub visible_only: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_text_width: 60,
            visible_only: false,
        }
    }
}

/// Render the whole snapshot.
pub fn format_tree(snapshot: &Snapshot, options: &FormatOptions) -> String {
    let mut out = String::new();
    if let Some(reason) = snapshot.diagnostic() {
        let _ = writeln!(out, "# degraded snapshot: {}", reason);
    }

    let mut skip_below: Option<usize> = None;
    for node in snapshot.iter() {
        if let Some(depth) = skip_below {
            if node.depth > depth {
                continue;
            }
            skip_below = None;
        }
        // The root is kept so the output always has an anchor line
        if options.visible_only && node.parent.is_some() && !node.is_visible() {
            skip_below = Some(node.depth);
            continue;
        }
        format_line(node, options, &mut out);
    }
    out
}

/// Render a single node without indentation.
pub fn format_node(node: &Node, options: &FormatOptions) -> String {
    let mut line = String::new();
    let mut context = Vec::new();

    let _ = write!(line, "{} [{}]", node.id, node.short_class());
    if !node.resource_id.is_empty() {
        let _ = write!(line, " #{}", node.short_resource_id());
    }
    if !node.text.is_empty() {
        let _ = write!(line, " \"{}\"", truncate(&node.text, options.max_text_width));
    }
    if !node.description.is_empty() {
        context.push(format!(
            "desc: {}",
            truncate(&node.description, options.max_text_width)
        ));
    }
    if !node.bounds.is_empty() {
        context.push(format!("bounds: {}", node.bounds));
    }
    for flag in [
        Flag::Clickable,
        Flag::LongClickable,
        Flag::Scrollable,
        Flag::Checked,
        Flag::Selected,
        Flag::Focused,
        Flag::Password,
    ] {
        if node.flag(flag) {
            context.push(flag.attr_name().to_string());
        }
    }
    if !node.flag(Flag::Enabled) {
        context.push("disabled".to_string());
    }
    if !node.flag(Flag::VisibleToUser) {
        context.push("hidden".to_string());
    }

    if !context.is_empty() {
        let _ = write!(line, " ({})", context.join(", "));
    }
    line
}

fn format_line(node: &Node, options: &FormatOptions, out: &mut String) {
    out.push_str(&"  ".repeat(node.depth));
    out.push_str(&format_node(node, options));
    out.push('\n');
}

/// Cut `text` to at most `max_width` display columns, marking the cut.
pub fn truncate(text: &str, max_width: usize) -> String {
    let text = text.replace(['\n', '\r'], " ");
    if text.width() <= max_width {
        return text;
    }
    if max_width == 0 {
        return String::new();
    }

    let budget = max_width - 1;
    let mut width = 0;
    let mut cut = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        cut.push(ch);
    }
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_hierarchy;

    const SCREEN: &str = r#"<hierarchy>
  <node class="android.widget.FrameLayout" bounds="[0,0][1080,1920]">
    <node class="android.widget.Button" resource-id="com.app:id/login" text="Log in" clickable="true" bounds="[40,800][1040,900]"/>
    <node class="android.widget.LinearLayout" visible-to-user="false" bounds="[0,0][0,0]">
      <node class="android.widget.TextView" text="Secret"/>
    </node>
    <node class="android.widget.EditText" enabled="false" password="true" bounds="[40,600][1040,700]"/>
  </node>
</hierarchy>"#;

    #[test]
    fn test_renders_indented_lines() {
        let snap = parse_hierarchy(SCREEN);
        let text = format_tree(&snap, &FormatOptions::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "n0 [hierarchy]");
        assert_eq!(
            lines[2],
            "    n2 [Button] #login \"Log in\" (bounds: [40,800][1040,900], clickable)"
        );
        assert!(lines[5].contains("password"));
        assert!(lines[5].contains("disabled"));
    }

    #[test]
    fn test_visible_only_prunes_hidden_subtrees() {
        let snap = parse_hierarchy(SCREEN);
        let options = FormatOptions {
            visible_only: true,
            ..FormatOptions::default()
        };
        let text = format_tree(&snap, &options);
        assert!(!text.contains("Secret"));
        assert!(!text.contains("LinearLayout"));
        assert!(text.contains("EditText"));
    }

    #[test]
    fn test_degraded_snapshot_shows_reason() {
        let snap = parse_hierarchy("");
        let text = format_tree(&snap, &FormatOptions::default());
        assert!(text.starts_with("# degraded snapshot:"));
    }

    #[test]
    fn test_truncate_measures_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        // Each CJK char is two columns wide
        assert_eq!(truncate("日本語テキスト", 5), "日本…");
        assert_eq!(truncate("line\nbreak", 20), "line break");
        assert_eq!(truncate("abc", 0), "");
    }
}
