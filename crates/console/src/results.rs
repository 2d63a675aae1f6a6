use protocol::ResultNode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Aggregate {
    pub(crate) duration_ms: u64,
    pub(crate) has_failure: bool,
}

/// Bottom-up aggregate of a result tree: a leaf contributes its own
/// duration and failure flag, an internal node the sum of its children's
/// durations and the OR of their failure flags. Pure and idempotent.
///
/// A leaf with no recorded duration counts as zero; the absence is handled
/// here, explicitly, rather than leaking into the summation.
pub(crate) fn aggregate(node: &ResultNode) -> Aggregate {
    match node {
        ResultNode::Leaf {
            duration_ms,
            success,
            ..
        } => Aggregate {
            duration_ms: duration_ms.unwrap_or(0),
            has_failure: !success,
        },
        ResultNode::Internal { children, .. } => {
            let mut total = Aggregate {
                duration_ms: 0,
                has_failure: false,
            };
            for child in children {
                let child = aggregate(child);
                total.duration_ms += child.duration_ms;
                total.has_failure = total.has_failure || child.has_failure;
            }
            total
        }
    }
}

/// Result tree annotated with aggregates, handed to the hierarchical
/// layout. This is a derived copy: the layout engine may overwrite its
/// geometry fields freely while the fetched `ResultNode` tree stays
/// untouched, so aggregation can always be re-run from the source.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct AggregatedNode {
    pub(crate) name: String,
    pub(crate) duration_ms: u64,
    pub(crate) has_failure: bool,
    pub(crate) leaf: bool,
    pub(crate) children: Vec<AggregatedNode>,
}

pub(crate) fn aggregate_tree(node: &ResultNode) -> AggregatedNode {
    let total = aggregate(node);
    match node {
        ResultNode::Leaf { name, .. } => AggregatedNode {
            name: name.clone(),
            duration_ms: total.duration_ms,
            has_failure: total.has_failure,
            leaf: true,
            children: Vec::new(),
        },
        ResultNode::Internal { name, children } => AggregatedNode {
            name: name.clone(),
            duration_ms: total.duration_ms,
            has_failure: total.has_failure,
            leaf: false,
            children: children.iter().map(aggregate_tree).collect(),
        },
    }
}
