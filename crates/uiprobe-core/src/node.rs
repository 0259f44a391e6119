//! UI node types and geometry.
//!
//! A [`Node`] is one element of a captured UI hierarchy. Nodes live in the
//! arena of a [`Snapshot`](crate::snapshot::Snapshot) and refer to each
//! other by [`NodeId`], so parent links never own anything.
//!
//! # Coordinates
//!
//! Bounds are screen pixels as reported by the device, encoded in dumps as
//! `[x1,y1][x2,y2]`. Center and size are always derived from the bounds.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a node in its snapshot's arena.
///
/// Ids are assigned in document (pre-order) order starting at 0 for the
/// root, so comparing ids compares document positions. They are unique
/// within a snapshot but say nothing about nodes of other snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Bounding rectangle with `x2 >= x1` and `y2 >= y1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Bounds {
    /// Build a rectangle, clamping reversed edges so the invariant holds.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1,
            y1,
            x2: x2.max(x1),
            y2: y2.max(y1),
        }
    }

    /// Parse the dump encoding `[x1,y1][x2,y2]`.
    ///
    /// Returns None for anything that isn't exactly four integers in that
    /// shape (surrounding whitespace is tolerated).
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.trim().strip_prefix('[')?;
        let (first, rest) = rest.split_once("][")?;
        let second = rest.strip_suffix(']')?;

        let (x1, y1) = parse_pair(first)?;
        let (x2, y2) = parse_pair(second)?;
        Some(Self::new(x1, y1, x2, y2))
    }

    /// Saturates at `i32::MAX` for rectangles wider than an i32 can hold.
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Integer midpoint of the rectangle.
    pub fn center(&self) -> Point {
        Point {
            x: self.x1 + self.width() / 2,
            y: self.y1 + self.height() / 2,
        }
    }

    /// True when the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when all four edges of `inner` lie within (or on) this rectangle.
    pub fn contains(&self, inner: &Bounds) -> bool {
        inner.x1 >= self.x1 && inner.y1 >= self.y1 && inner.x2 <= self.x2 && inner.y2 <= self.y2
    }
}

/// Free-function form of [`Bounds::contains`].
pub fn is_within(child: &Bounds, parent: &Bounds) -> bool {
    parent.contains(child)
}

fn parse_pair(s: &str) -> Option<(i32, i32)> {
    let (a, b) = s.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}][{},{}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Boolean state flags of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Clickable,
    LongClickable,
    Enabled,
    Selected,
    Focused,
    Focusable,
    Scrollable,
    Checkable,
    Checked,
    Password,
    VisibleToUser,
}

impl Flag {
    pub const ALL: [Flag; 11] = [
        Flag::Clickable,
        Flag::LongClickable,
        Flag::Enabled,
        Flag::Selected,
        Flag::Focused,
        Flag::Focusable,
        Flag::Scrollable,
        Flag::Checkable,
        Flag::Checked,
        Flag::Password,
        Flag::VisibleToUser,
    ];

    /// Attribute name used in hierarchy dumps.
    pub fn attr_name(self) -> &'static str {
        match self {
            Flag::Clickable => "clickable",
            Flag::LongClickable => "long-clickable",
            Flag::Enabled => "enabled",
            Flag::Selected => "selected",
            Flag::Focused => "focused",
            Flag::Focusable => "focusable",
            Flag::Scrollable => "scrollable",
            Flag::Checkable => "checkable",
            Flag::Checked => "checked",
            Flag::Password => "password",
            Flag::VisibleToUser => "visible-to-user",
        }
    }

    /// Value assumed when the dump omits the attribute.
    pub fn default_value(self) -> bool {
        matches!(self, Flag::Enabled | Flag::VisibleToUser)
    }

    /// Resolve a dump attribute name or its camelCase spelling.
    pub fn from_name(name: &str) -> Option<Flag> {
        let flag = match name {
            "clickable" => Flag::Clickable,
            "long-clickable" | "longClickable" => Flag::LongClickable,
            "enabled" => Flag::Enabled,
            "selected" => Flag::Selected,
            "focused" => Flag::Focused,
            "focusable" => Flag::Focusable,
            "scrollable" => Flag::Scrollable,
            "checkable" => Flag::Checkable,
            "checked" => Flag::Checked,
            "password" => Flag::Password,
            "visible-to-user" | "visibleToUser" | "visible" => Flag::VisibleToUser,
            _ => return None,
        };
        Some(flag)
    }
}

/// The full set of flags for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub clickable: bool,
    pub long_clickable: bool,
    pub enabled: bool,
    pub selected: bool,
    pub focused: bool,
    pub focusable: bool,
    pub scrollable: bool,
    pub checkable: bool,
    pub checked: bool,
    pub password: bool,
    pub visible_to_user: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            clickable: false,
            long_clickable: false,
            enabled: true,
            selected: false,
            focused: false,
            focusable: false,
            scrollable: false,
            checkable: false,
            checked: false,
            password: false,
            visible_to_user: true,
        }
    }
}

impl Flags {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Clickable => self.clickable,
            Flag::LongClickable => self.long_clickable,
            Flag::Enabled => self.enabled,
            Flag::Selected => self.selected,
            Flag::Focused => self.focused,
            Flag::Focusable => self.focusable,
            Flag::Scrollable => self.scrollable,
            Flag::Checkable => self.checkable,
            Flag::Checked => self.checked,
            Flag::Password => self.password,
            Flag::VisibleToUser => self.visible_to_user,
        }
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::Clickable => &mut self.clickable,
            Flag::LongClickable => &mut self.long_clickable,
            Flag::Enabled => &mut self.enabled,
            Flag::Selected => &mut self.selected,
            Flag::Focused => &mut self.focused,
            Flag::Focusable => &mut self.focusable,
            Flag::Scrollable => &mut self.scrollable,
            Flag::Checkable => &mut self.checkable,
            Flag::Checked => &mut self.checked,
            Flag::Password => &mut self.password,
            Flag::VisibleToUser => &mut self.visible_to_user,
        };
        *slot = value;
    }
}

/// One UI element of a captured hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Dotted child-position path from the root (`0`, `0.1`, `0.1.3`, ...).
    pub path: String,
    pub depth: usize,
    /// Widget type, e.g. `android.widget.Button`.
    pub class_name: String,
    /// Usually `<package>:id/<name>`, may be empty.
    pub resource_id: String,
    pub text: String,
    pub description: String,
    pub package: String,
    /// Positional index reported by the dump (sibling position when absent).
    pub index: u32,
    pub bounds: Bounds,
    pub flags: Flags,
    /// Dump attributes with no dedicated field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a node with default attributes.
    pub fn new(id: NodeId, class_name: impl Into<String>) -> Self {
        Self {
            id,
            path: "0".to_string(),
            depth: 0,
            class_name: class_name.into(),
            resource_id: String::new(),
            text: String::new(),
            description: String::new(),
            package: String::new(),
            index: 0,
            bounds: Bounds::default(),
            flags: Flags::default(),
            extras: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn size(&self) -> Size {
        self.bounds.size()
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.get(flag)
    }

    /// Visible to the user and covering some screen area.
    pub fn is_visible(&self) -> bool {
        self.flags.visible_to_user && !self.bounds.is_empty()
    }

    /// Class name after the last `.` (`android.widget.Button` -> `Button`).
    pub fn short_class(&self) -> &str {
        self.class_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_name)
    }

    /// Resource id after `:id/`, or the whole id when it has no namespace.
    pub fn short_resource_id(&self) -> &str {
        match self.resource_id.split_once(":id/") {
            Some((_, name)) => name,
            None => &self.resource_id,
        }
    }

    /// Look up an attribute by dump name or camelCase alias.
    ///
    /// Flags and the index are stringified; unknown names fall through to
    /// the extras map.
    pub fn attribute(&self, name: &str) -> Option<String> {
        if let Some(flag) = Flag::from_name(name) {
            return Some(self.flag(flag).to_string());
        }
        match name {
            "text" => Some(self.text.clone()),
            "content-desc" | "contentDesc" | "description" | "desc" => {
                Some(self.description.clone())
            }
            "resource-id" | "resourceId" | "id" => Some(self.resource_id.clone()),
            "class" | "className" => Some(self.class_name.clone()),
            "package" => Some(self.package.clone()),
            "index" => Some(self.index.to_string()),
            "bounds" => Some(self.bounds.to_string()),
            other => self.extras.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_parse_and_display_roundtrip_exactly() {
        let raw = "[0,63][1080,210]";
        let bounds = Bounds::parse(raw).unwrap();
        assert_eq!(bounds, Bounds::new(0, 63, 1080, 210));
        assert_eq!(bounds.to_string(), raw);
    }

    #[test]
    fn test_bounds_parse_rejects_garbage() {
        assert!(Bounds::parse("").is_none());
        assert!(Bounds::parse("[0,0]").is_none());
        assert!(Bounds::parse("[a,b][c,d]").is_none());
        assert!(Bounds::parse("0,0,10,10").is_none());
    }

    #[test]
    fn test_bounds_clamps_reversed_edges() {
        let bounds = Bounds::new(100, 100, 50, 20);
        assert_eq!(bounds.x2, 100);
        assert_eq!(bounds.y2, 100);
        assert!(bounds.is_empty());
    }

    #[test]
    fn test_center_and_size_are_derived() {
        let bounds = Bounds::new(10, 20, 110, 61);
        assert_eq!(bounds.center(), Point::new(60, 40));
        assert_eq!(
            bounds.size(),
            Size {
                width: 100,
                height: 41
            }
        );
    }

    #[test]
    fn test_containment_includes_shared_edges() {
        let parent = Bounds::new(0, 0, 100, 100);
        assert!(is_within(&Bounds::new(0, 0, 100, 100), &parent));
        assert!(is_within(&Bounds::new(10, 10, 20, 20), &parent));
        assert!(!is_within(&Bounds::new(10, 10, 101, 20), &parent));
    }

    #[test]
    fn test_extreme_bounds_saturate() {
        let bounds = Bounds::parse("[-2000000000,0][2000000000,10]").unwrap();
        assert_eq!(bounds.width(), i32::MAX);
        assert!(!bounds.is_empty());
        let center = bounds.center();
        assert!(center.x > bounds.x1 && center.x < bounds.x2);
        assert_eq!(center.y, 5);

        let full = Bounds::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(full.size().height, i32::MAX);
        assert_eq!(full.center().x, i32::MIN + i32::MAX / 2);
    }

    #[test]
    fn test_flag_defaults_match_dump_conventions() {
        let flags = Flags::default();
        for flag in Flag::ALL {
            assert_eq!(flags.get(flag), flag.default_value(), "{:?}", flag);
        }
    }

    #[test]
    fn test_flag_names_accept_both_spellings() {
        assert_eq!(Flag::from_name("long-clickable"), Some(Flag::LongClickable));
        assert_eq!(Flag::from_name("longClickable"), Some(Flag::LongClickable));
        assert_eq!(Flag::from_name("visible-to-user"), Some(Flag::VisibleToUser));
        assert_eq!(Flag::from_name("text"), None);
    }

    #[test]
    fn test_short_names() {
        let mut node = Node::new(NodeId(3), "android.widget.Button");
        node.resource_id = "com.app:id/login".to_string();
        assert_eq!(node.short_class(), "Button");
        assert_eq!(node.short_resource_id(), "login");

        node.resource_id = "login".to_string();
        assert_eq!(node.short_resource_id(), "login");
    }

    #[test]
    fn test_attribute_lookup_uses_aliases_and_extras() {
        let mut node = Node::new(NodeId(0), "android.widget.TextView");
        node.description = "Search".to_string();
        node.extras.insert("hint".to_string(), "Type here".to_string());
        assert_eq!(node.attribute("content-desc").as_deref(), Some("Search"));
        assert_eq!(node.attribute("contentDesc").as_deref(), Some("Search"));
        assert_eq!(node.attribute("enabled").as_deref(), Some("true"));
        assert_eq!(node.attribute("hint").as_deref(), Some("Type here"));
        assert_eq!(node.attribute("missing"), None);
    }
}
