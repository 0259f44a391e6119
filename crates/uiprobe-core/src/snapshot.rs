//! Captured UI hierarchy state.
//!
//! A [`Snapshot`] is an immutable tree of [`Node`]s plus the time it was
//! captured. A new capture produces a new snapshot; existing ones are never
//! mutated, so handles and query results can keep reading an old snapshot
//! while the cache moves on.
//!
//! # Layout
//!
//! Nodes are stored in a flat arena in pre-order. The root is always
//! `NodeId(0)`, and iterating the arena front to back *is* the pre-order
//! traversal, which is the canonical match order of the query engine.
//!
//! # Change Detection
//!
//! The `content_hash` field summarizes what is on screen (classes, ids,
//! texts, descriptions, bounds and flags). Two captures of an unchanged
//! screen hash equal, so waiting for navigation is a hash comparison:
//!
//! ```ignore
//! if new_snapshot.content_hash() != baseline {
//!     // Screen changed
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::node::{Flag, Node, NodeId};

/// Prefix placed in the text of a degraded snapshot's root node.
pub const PARSE_FAILURE_MARKER: &str = "[uiprobe:parse-failure]";

static SNAPSHOT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Next process-wide snapshot id.
///
/// Relaxed ordering is enough: ids only need to be unique.
fn next_snapshot_id() -> u64 {
    SNAPSHOT_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An immutable captured UI tree.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    snapshot_id: u64,
    captured_at: DateTime<Utc>,
    content_hash: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<String>,
    nodes: Vec<Node>,
}

impl Snapshot {
    /// Build a snapshot from an arena already laid out in pre-order.
    ///
    /// The arena must be non-empty, with `nodes[i].id == NodeId(i)` and
    /// parent/child links referring into the same arena.
    pub(crate) fn from_arena(nodes: Vec<Node>) -> Self {
        debug_assert!(!nodes.is_empty());
        debug_assert!(nodes.iter().enumerate().all(|(i, n)| n.id.0 == i));
        let content_hash = compute_content_hash(&nodes);
        Self {
            snapshot_id: next_snapshot_id(),
            captured_at: Utc::now(),
            content_hash,
            diagnostic: None,
            nodes,
        }
    }

    /// A single-node snapshot standing in for an unparseable dump.
    ///
    /// The root's text and description both start with
    /// [`PARSE_FAILURE_MARKER`] so the failure is visible to anything that
    /// only looks at nodes.
    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let marker = format!("{} {}", PARSE_FAILURE_MARKER, reason);
        let mut root = Node::new(NodeId::ROOT, "hierarchy");
        root.text = marker.clone();
        root.description = marker;
        let mut snapshot = Self::from_arena(vec![root]);
        snapshot.diagnostic = Some(reason);
        snapshot
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Why parsing failed, for degraded snapshots.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a snapshot has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Index an id known to come from this snapshot.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All nodes in pre-order (depth-first, document order).
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get(id)?.parent.map(|p| self.node(p))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |c| self.node(*c))
    }

    /// Every node below `id`, in pre-order, excluding `id` itself.
    ///
    /// Because the arena is pre-ordered, a subtree is the contiguous run of
    /// nodes after `id` that are deeper than it.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        let depth = self.get(id).map(|n| n.depth).unwrap_or(usize::MAX);
        let start = (id.0 + 1).min(self.nodes.len());
        self.nodes[start..]
            .iter()
            .take_while(move |n| n.depth > depth)
    }

    /// Human-readable selector for debugging and logs.
    ///
    /// Built from the short class and the strongest identifying attribute
    /// (resource id, then text, then description), with `:nth(k)` appended
    /// when a sibling would otherwise produce the same string.
    pub fn describe(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return format!("<unknown {}>", id);
        };
        let base = base_selector(node);

        let Some(parent) = node.parent else {
            return base;
        };
        let twins: Vec<NodeId> = self
            .node(parent)
            .children
            .iter()
            .copied()
            .filter(|c| base_selector(self.node(*c)) == base)
            .collect();
        if twins.len() < 2 {
            return base;
        }
        let position = twins.iter().position(|c| *c == id).unwrap_or(0) + 1;
        format!("{}:nth({})", base, position)
    }
}

fn base_selector(node: &Node) -> String {
    let class = node.short_class();
    if !node.resource_id.is_empty() {
        format!("{}#{}", class, node.short_resource_id())
    } else if !node.text.is_empty() {
        format!("{}[text=\"{}\"]", class, node.text)
    } else if !node.description.is_empty() {
        format!("{}[content-desc=\"{}\"]", class, node.description)
    } else {
        class.to_string()
    }
}

/// Compute a content hash over what the user can see.
///
/// Uses FNV-1a, a fast non-cryptographic hash suitable for change detection.
#[must_use]
pub fn compute_content_hash(nodes: &[Node]) -> u64 {
    // FNV-1a parameters for 64-bit
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x00000100000001B3;

    let mut hash = FNV_OFFSET;
    let mut feed = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        // Field separator so "ab"+"c" and "a"+"bc" differ
        hash ^= 0xff;
        hash = hash.wrapping_mul(FNV_PRIME);
    };

    for node in nodes {
        feed(node.path.as_bytes());
        feed(node.class_name.as_bytes());
        feed(node.resource_id.as_bytes());
        feed(node.text.as_bytes());
        feed(node.description.as_bytes());
        feed(node.bounds.to_string().as_bytes());
        let bits: Vec<u8> = Flag::ALL
            .iter()
            .map(|f| u8::from(node.flag(*f)))
            .collect();
        feed(&bits);
    }
    hash
}
