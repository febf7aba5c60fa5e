//! Filter for range-bounded queries without a limit.

use std::cmp::Ordering;

use crate::path::Path;
use crate::snap::index::Index;
use crate::snap::node::{NamedNode, Node};
use crate::view::change::ChildChangeAccumulator;
use crate::view::complete_child_source::CompleteChildSource;
use crate::view::filter::{IndexedFilter, NodeFilter};
use crate::view::query_params::QueryParams;

pub struct RangedFilter {
    indexed_filter: IndexedFilter,
    index: Index,
    start_post: NamedNode,
    end_post: NamedNode,
}

impl RangedFilter {
    pub fn new(params: &QueryParams) -> RangedFilter {
        RangedFilter {
            indexed_filter: IndexedFilter::new(params.get_index().clone()),
            index: params.get_index().clone(),
            start_post: params.get_start_post(),
            end_post: params.get_end_post(),
        }
    }

    pub fn start_post(&self) -> &NamedNode {
        &self.start_post
    }

    pub fn end_post(&self) -> &NamedNode {
        &self.end_post
    }

    /// Whether `node` falls inside the window (endpoints inclusive).
    pub fn matches(&self, node: &NamedNode) -> bool {
        self.index.compare(&self.start_post, node) != Ordering::Greater
            && self.index.compare(node, &self.end_post) != Ordering::Greater
    }
}

impl NodeFilter for RangedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &str,
        new_child: &Node,
        affected_path: &Path,
        source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        let new_child = if self.matches(&NamedNode::new(key, new_child.clone())) {
            new_child.clone()
        } else {
            Node::empty()
        };
        self.indexed_filter
            .update_child(snap, key, &new_child, affected_path, source, accumulator)
    }

    fn update_full_node(
        &self,
        old_snap: &Node,
        new_snap: &Node,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        let mut filtered = if new_snap.is_leaf() {
            // Leaves never match a range; the filtered view is empty.
            Node::empty()
        } else {
            let mut filtered = new_snap.with_index(&self.index);
            new_snap.for_each_child(&Index::Priority, &mut |key, child| {
                if !self.matches(&NamedNode::new(key, child.clone())) {
                    filtered = filtered.update_immediate_child(key, &Node::empty());
                }
                false
            });
            filtered
        };
        // Queries never carry priorities on their root.
        filtered = filtered.update_priority(&Node::empty());
        self.indexed_filter
            .update_full_node(old_snap, &filtered, accumulator)
    }

    fn update_priority(&self, old_snap: &Node, _new_priority: &Node) -> Node {
        old_snap.clone()
    }

    fn filters_nodes(&self) -> bool {
        true
    }

    fn indexed_filter(&self) -> &IndexedFilter {
        &self.indexed_filter
    }

    fn index(&self) -> &Index {
        &self.index
    }
}
