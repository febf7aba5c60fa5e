//! The windowless filter: keeps everything, tracks diffs.

use crate::path::Path;
use crate::snap::index::Index;
use crate::snap::node::Node;
use crate::view::change::{Change, ChildChangeAccumulator};
use crate::view::complete_child_source::CompleteChildSource;
use crate::view::filter::NodeFilter;

pub struct IndexedFilter {
    index: Index,
}

impl IndexedFilter {
    pub fn new(index: Index) -> IndexedFilter {
        IndexedFilter { index }
    }
}

impl NodeFilter for IndexedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &str,
        new_child: &Node,
        affected_path: &Path,
        _source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        debug_assert!(snap.is_indexed(&self.index), "node must be indexed");
        let old_child = snap.get_immediate_child(key);
        // No-op updates (same subtree at the affected path, same
        // presence) leave the node untouched.
        if old_child.get_child(affected_path) == new_child.get_child(affected_path)
            && old_child.is_empty() == new_child.is_empty()
        {
            return snap.clone();
        }
        if let Some(acc) = accumulator {
            if new_child.is_empty() {
                if snap.has_child(key) {
                    acc.track_child_change(Change::child_removed(key, old_child.clone()));
                } else {
                    debug_assert!(
                        snap.is_leaf(),
                        "removal without an old child only happens on a leaf"
                    );
                }
            } else if old_child.is_empty() {
                acc.track_child_change(Change::child_added(key, new_child.clone()));
            } else {
                acc.track_child_change(Change::child_changed(
                    key,
                    new_child.clone(),
                    old_child.clone(),
                ));
            }
        }
        if snap.is_leaf() && new_child.is_empty() {
            snap.clone()
        } else {
            snap.update_immediate_child(key, new_child).with_index(&self.index)
        }
    }

    fn update_full_node(
        &self,
        old_snap: &Node,
        new_snap: &Node,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        if let Some(acc) = accumulator {
            if !old_snap.is_leaf() {
                old_snap.for_each_child(&Index::Priority, &mut |key, child| {
                    if !new_snap.has_child(key) {
                        acc.track_child_change(Change::child_removed(key, child.clone()));
                    }
                    false
                });
            }
            if !new_snap.is_leaf() {
                new_snap.for_each_child(&Index::Priority, &mut |key, child| {
                    if old_snap.has_child(key) {
                        let old_child = old_snap.get_immediate_child(key);
                        if &old_child != child {
                            acc.track_child_change(Change::child_changed(
                                key,
                                child.clone(),
                                old_child,
                            ));
                        }
                    } else {
                        acc.track_child_change(Change::child_added(key, child.clone()));
                    }
                    false
                });
            }
        }
        new_snap.with_index(&self.index)
    }

    fn update_priority(&self, old_snap: &Node, new_priority: &Node) -> Node {
        if old_snap.is_empty() {
            Node::empty()
        } else {
            old_snap.update_priority(new_priority)
        }
    }

    fn filters_nodes(&self) -> bool {
        false
    }

    fn indexed_filter(&self) -> &IndexedFilter {
        self
    }

    fn index(&self) -> &Index {
        &self.index
    }
}
