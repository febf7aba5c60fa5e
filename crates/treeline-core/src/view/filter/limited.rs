//! Filter for limit queries: a ranged window that keeps at most
//! `limit` children anchored to one end.

use std::cmp::Ordering;

use crate::path::Path;
use crate::snap::index::Index;
use crate::snap::node::{NamedNode, Node};
use crate::view::change::{Change, ChildChangeAccumulator};
use crate::view::complete_child_source::CompleteChildSource;
use crate::view::filter::{IndexedFilter, NodeFilter, RangedFilter};
use crate::view::query_params::QueryParams;

pub struct LimitedFilter {
    ranged_filter: RangedFilter,
    index: Index,
    limit: usize,
    /// Anchored to the window's end (`limit_to_last`): iteration and
    /// comparisons run back to front.
    reverse: bool,
}

impl LimitedFilter {
    pub fn new(params: &QueryParams) -> LimitedFilter {
        LimitedFilter {
            ranged_filter: RangedFilter::new(params),
            index: params.get_index().clone(),
            limit: params.get_limit(),
            reverse: !params.is_view_from_left(),
        }
    }

    fn compare(&self, a: &NamedNode, b: &NamedNode) -> Ordering {
        if self.reverse {
            self.index.compare(b, a)
        } else {
            self.index.compare(a, b)
        }
    }

    /// Update against a window that is already full.
    fn full_limit_update_child(
        &self,
        snap: &Node,
        child_key: &str,
        child_snap: &Node,
        source: &dyn CompleteChildSource,
        mut accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        debug_assert_eq!(snap.num_children(), self.limit, "window must be full");
        let new_child_named = NamedNode::new(child_key, child_snap.clone());
        let window_boundary = if self.reverse {
            snap.get_first_child(&self.index)
        } else {
            snap.get_last_child(&self.index)
        }
        .expect("a full window has a boundary child");
        let in_range = self.ranged_filter.matches(&new_child_named);

        if snap.has_child(child_key) {
            let old_child_snap = snap.get_immediate_child(child_key);
            // Find the child that would slide into the window; skip
            // entries the window already holds (pending merges can
            // surface those before the filter has seen them).
            let mut next_child = source.get_child_after_child(&self.index, &window_boundary, self.reverse);
            while let Some(next) = &next_child {
                if next.name == child_key || snap.has_child(&next.name) {
                    next_child = source.get_child_after_child(&self.index, next, self.reverse);
                } else {
                    break;
                }
            }
            let compare_next = match &next_child {
                Some(next) => self.compare(next, &new_child_named),
                None => Ordering::Greater,
            };
            let remains_in_window =
                in_range && !child_snap.is_empty() && compare_next != Ordering::Less;
            if remains_in_window {
                if let Some(acc) = accumulator.as_deref_mut() {
                    acc.track_child_change(Change::child_changed(
                        child_key,
                        child_snap.clone(),
                        old_child_snap,
                    ));
                }
                snap.update_immediate_child(child_key, child_snap)
            } else {
                if let Some(acc) = accumulator.as_deref_mut() {
                    acc.track_child_change(Change::child_removed(child_key, old_child_snap));
                }
                let new_event_cache = snap.update_immediate_child(child_key, &Node::empty());
                let next_in_range = next_child
                    .as_ref()
                    .map_or(false, |next| self.ranged_filter.matches(next));
                if next_in_range {
                    let next = next_child.unwrap();
                    if let Some(acc) = accumulator.as_deref_mut() {
                        acc.track_child_change(Change::child_added(&next.name, next.node.clone()));
                    }
                    new_event_cache.update_immediate_child(&next.name, &next.node)
                } else {
                    new_event_cache
                }
            }
        } else if child_snap.is_empty() {
            // Deleting a child that was never in the window.
            snap.clone()
        } else if in_range {
            if self.compare(&window_boundary, &new_child_named) != Ordering::Less {
                if let Some(acc) = accumulator.as_deref_mut() {
                    acc.track_child_change(Change::child_removed(
                        &window_boundary.name,
                        window_boundary.node.clone(),
                    ));
                    acc.track_child_change(Change::child_added(child_key, child_snap.clone()));
                }
                snap.update_immediate_child(child_key, child_snap)
                    .update_immediate_child(&window_boundary.name, &Node::empty())
            } else {
                snap.clone()
            }
        } else {
            snap.clone()
        }
    }
}

impl NodeFilter for LimitedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &str,
        new_child: &Node,
        affected_path: &Path,
        source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        let new_child = if self.ranged_filter.matches(&NamedNode::new(key, new_child.clone())) {
            new_child.clone()
        } else {
            Node::empty()
        };
        if snap.get_immediate_child(key) == new_child {
            snap.clone()
        } else if snap.num_children() < self.limit {
            self.ranged_filter.indexed_filter().update_child(
                snap,
                key,
                &new_child,
                affected_path,
                source,
                accumulator,
            )
        } else {
            self.full_limit_update_child(snap, key, &new_child, source, accumulator)
        }
    }

    fn update_full_node(
        &self,
        old_snap: &Node,
        new_snap: &Node,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node {
        let filtered;
        if new_snap.is_leaf() || new_snap.is_empty() {
            filtered = Node::empty();
        } else if self.limit * 2 < new_snap.num_children() && new_snap.is_indexed(&self.index) {
            // Window is small relative to the node; build it up by
            // walking from the anchored end.
            let mut built = Node::empty();
            let start = if self.reverse {
                self.ranged_filter.end_post()
            } else {
                self.ranged_filter.start_post()
            };
            let mut count = 0;
            for next in new_snap.iter_children_from(&self.index, start, self.reverse) {
                if count >= self.limit {
                    break;
                }
                let in_range = if self.reverse {
                    self.index.compare(self.ranged_filter.start_post(), &next)
                        != Ordering::Greater
                } else {
                    self.index.compare(&next, self.ranged_filter.end_post())
                        != Ordering::Greater
                };
                if in_range {
                    built = built.update_immediate_child(&next.name, &next.node);
                    count += 1;
                } else {
                    // Past the far endpoint; nothing else can match.
                    break;
                }
            }
            filtered = built;
        } else {
            // Cheaper to strip children that fall outside the window.
            let mut stripped = new_snap.with_index(&self.index).update_priority(&Node::empty());
            let (start, end) = if self.reverse {
                (self.ranged_filter.end_post(), self.ranged_filter.start_post())
            } else {
                (self.ranged_filter.start_post(), self.ranged_filter.end_post())
            };
            let mut count = 0;
            let mut found_start = false;
            let children: Vec<NamedNode> = if self.reverse {
                new_snap.iter_children_reverse(&self.index).collect()
            } else {
                new_snap.iter_children(&self.index).collect()
            };
            for next in children {
                if !found_start && self.compare(start, &next) != Ordering::Greater {
                    found_start = true;
                }
                let in_range =
                    found_start && count < self.limit && self.compare(&next, end) != Ordering::Greater;
                if in_range {
                    count += 1;
                } else {
                    stripped = stripped.update_immediate_child(&next.name, &Node::empty());
                }
            }
            filtered = stripped;
        }
        self.ranged_filter
            .indexed_filter()
            .update_full_node(old_snap, &filtered, accumulator)
    }

    fn update_priority(&self, old_snap: &Node, _new_priority: &Node) -> Node {
        old_snap.clone()
    }

    fn filters_nodes(&self) -> bool {
        true
    }

    fn indexed_filter(&self) -> &IndexedFilter {
        self.ranged_filter.indexed_filter()
    }

    fn index(&self) -> &Index {
        &self.index
    }
}
