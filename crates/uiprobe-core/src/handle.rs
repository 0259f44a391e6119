//! Element handles.
//!
//! A handle points at one node of one snapshot and carries the node's
//! geometry as it was when the snapshot was captured. Geometry is frozen:
//! actions dispatched through a handle always use these coordinates, even
//! if the screen has changed since. Use `DeviceSession::requery` to get a
//! handle on the current screen.

use std::sync::Arc;

use serde::Serialize;

use crate::node::{Bounds, Node, NodeId, Point, Size};
use crate::query::find_all_within;
use crate::selector::Selector;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct ElementHandle {
    snapshot: Arc<Snapshot>,
    node: NodeId,
    bounds: Bounds,
    center: Point,
    size: Size,
    selector: Option<Selector>,
}

impl ElementHandle {
    /// Freeze the geometry of `node` in `snapshot`.
    ///
    /// Returns `None` when the id is not part of the snapshot.
    pub fn new(snapshot: Arc<Snapshot>, node: NodeId, selector: Option<Selector>) -> Option<Self> {
        let bounds = snapshot.get(node)?.bounds;
        Some(Self {
            snapshot,
            node,
            bounds,
            center: bounds.center(),
            size: bounds.size(),
            selector,
        })
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn node(&self) -> &Node {
        self.snapshot.node(self.node)
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot.snapshot_id()
    }

    /// The selector that produced this handle, if any.
    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Tap target for actions.
    pub fn center(&self) -> Point {
        self.center
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_visible(&self) -> bool {
        self.node().is_visible()
    }

    /// True once a newer snapshot than the one this handle came from exists.
    pub fn is_stale(&self, current_snapshot_id: u64) -> bool {
        current_snapshot_id != self.snapshot.snapshot_id()
    }

    /// Matches of `selector` strictly below this node, in document order.
    ///
    /// Searches the snapshot this handle came from, so the results share its
    /// snapshot id and frozen geometry.
    pub fn find_all_within(&self, selector: &Selector) -> Vec<ElementHandle> {
        find_all_within(&self.snapshot, self.node, selector)
            .into_iter()
            .filter_map(|id| ElementHandle::new(self.snapshot.clone(), id, Some(selector.clone())))
            .collect()
    }

    /// First match below this node.
    pub fn find_within(&self, selector: &Selector) -> Option<ElementHandle> {
        self.find_all_within(selector).into_iter().next()
    }

    /// Debug selector for the node, e.g. `Button#login` or `TextView:nth(2)`.
    pub fn describe(&self) -> String {
        self.snapshot.describe(self.node)
    }

    /// Serializable summary of the handle.
    pub fn summary(&self) -> HandleSummary {
        let node = self.node();
        HandleSummary {
            snapshot_id: self.snapshot_id(),
            id: self.node,
            path: node.path.clone(),
            describe: self.describe(),
            class_name: node.class_name.clone(),
            resource_id: node.resource_id.clone(),
            text: node.text.clone(),
            description: node.description.clone(),
            bounds: self.bounds.to_string(),
            center: self.center,
            size: self.size,
            visible: node.is_visible(),
        }
    }
}

/// JSON shape of a matched element, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct HandleSummary {
    pub snapshot_id: u64,
    pub id: NodeId,
    pub path: String,
    pub describe: String,
    pub class_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub bounds: String,
    pub center: Point,
    pub size: Size,
    pub visible: bool,
}
