//! Query engine: evaluate selectors against a snapshot.
//!
//! Results are always in pre-order (document order), so the first element
//! of `find_all` is what `find_one` returns. Evaluation is read-only; the
//! snapshot is never touched.

use crate::node::NodeId;
use crate::selector::Selector;
use crate::snapshot::Snapshot;

/// Every node matching `selector`, in document order.
pub fn find_all(snapshot: &Snapshot, selector: &Selector) -> Vec<NodeId> {
    evaluate(snapshot, None, selector)
}

/// The first node in document order matching `selector`.
pub fn find_one(snapshot: &Snapshot, selector: &Selector) -> Option<NodeId> {
    match selector {
        Selector::Predicate(p) => snapshot.iter().find(|n| p.matches(n)).map(|n| n.id),
        Selector::Shorthand(s) => snapshot.iter().find(|n| s.matches(n)).map(|n| n.id),
        _ => find_all(snapshot, selector).into_iter().next(),
    }
}

/// Matches strictly below `context`, in document order.
pub fn find_all_within(snapshot: &Snapshot, context: NodeId, selector: &Selector) -> Vec<NodeId> {
    evaluate(snapshot, Some(context), selector)
}

fn evaluate(snapshot: &Snapshot, context: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
    match selector {
        Selector::Predicate(p) => scan(snapshot, context, |n| p.matches(n)),
        Selector::Shorthand(s) => scan(snapshot, context, |n| s.matches(n)),
        Selector::Path(q) => q.evaluate(snapshot, context.unwrap_or(NodeId::ROOT)),
        Selector::Alternatives(items) => items
            .iter()
            .map(|item| evaluate(snapshot, context, item))
            .find(|hits| !hits.is_empty())
            .unwrap_or_default(),
    }
}

fn scan(
    snapshot: &Snapshot,
    context: Option<NodeId>,
    pred: impl Fn(&crate::node::Node) -> bool,
) -> Vec<NodeId> {
    match context {
        None => snapshot.iter().filter(|n| pred(n)).map(|n| n.id).collect(),
        Some(ctx) => snapshot
            .descendants(ctx)
            .filter(|n| pred(n))
            .map(|n| n.id)
            .collect(),
    }
}
