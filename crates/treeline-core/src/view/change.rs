//! Change records produced while reprocessing a view's caches, and the
//! accumulator that reconciles successive changes to the same child.

use std::collections::BTreeMap;

use crate::snap::node::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Value,
    ChildAdded,
    ChildRemoved,
    ChildChanged,
    ChildMoved,
}

#[derive(Clone, Debug)]
pub struct Change {
    pub kind: ChangeType,
    pub snapshot_node: Node,
    pub child_name: Option<String>,
    pub old_snap: Option<Node>,
    /// Name of the preceding sibling in index order; filled in during
    /// event generation.
    pub prev_name: Option<String>,
}

impl Change {
    pub fn value(snapshot: Node) -> Change {
        Change {
            kind: ChangeType::Value,
            snapshot_node: snapshot,
            child_name: None,
            old_snap: None,
            prev_name: None,
        }
    }

    pub fn child_added(child_name: &str, snapshot: Node) -> Change {
        Change {
            kind: ChangeType::ChildAdded,
            snapshot_node: snapshot,
            child_name: Some(child_name.to_string()),
            old_snap: None,
            prev_name: None,
        }
    }

    pub fn child_removed(child_name: &str, snapshot: Node) -> Change {
        Change {
            kind: ChangeType::ChildRemoved,
            snapshot_node: snapshot,
            child_name: Some(child_name.to_string()),
            old_snap: None,
            prev_name: None,
        }
    }

    pub fn child_changed(child_name: &str, snapshot: Node, old_snap: Node) -> Change {
        Change {
            kind: ChangeType::ChildChanged,
            snapshot_node: snapshot,
            child_name: Some(child_name.to_string()),
            old_snap: Some(old_snap),
            prev_name: None,
        }
    }

    pub fn child_moved(child_name: &str, snapshot: Node) -> Change {
        Change {
            kind: ChangeType::ChildMoved,
            snapshot_node: snapshot,
            child_name: Some(child_name.to_string()),
            old_snap: None,
            prev_name: None,
        }
    }
}

/// Collapses multiple changes to one child into the single change a
/// listener should see.
#[derive(Default)]
pub struct ChildChangeAccumulator {
    changes: BTreeMap<String, Change>,
}

impl ChildChangeAccumulator {
    pub fn new() -> ChildChangeAccumulator {
        ChildChangeAccumulator::default()
    }

    pub fn track_child_change(&mut self, change: Change) {
        assert!(
            matches!(
                change.kind,
                ChangeType::ChildAdded | ChangeType::ChildChanged | ChangeType::ChildRemoved
            ),
            "only child changes are tracked"
        );
        let child_name = change
            .child_name
            .clone()
            .expect("child changes carry a child name");
        assert!(child_name != ".priority", "priority changes are not tracked");
        match self.changes.get(&child_name) {
            None => {
                self.changes.insert(child_name, change);
            }
            Some(old) => {
                let merged = match (change.kind, old.kind) {
                    (ChangeType::ChildAdded, ChangeType::ChildRemoved) => Some(
                        Change::child_changed(
                            &child_name,
                            change.snapshot_node,
                            old.snapshot_node.clone(),
                        ),
                    ),
                    (ChangeType::ChildRemoved, ChangeType::ChildAdded) => None,
                    (ChangeType::ChildRemoved, ChangeType::ChildChanged) => {
                        Some(Change::child_removed(
                            &child_name,
                            old.old_snap.clone().expect("changed tracks old snap"),
                        ))
                    }
                    (ChangeType::ChildChanged, ChangeType::ChildAdded) => {
                        Some(Change::child_added(&child_name, change.snapshot_node))
                    }
                    (ChangeType::ChildChanged, ChangeType::ChildChanged) => {
                        Some(Change::child_changed(
                            &child_name,
                            change.snapshot_node,
                            old.old_snap.clone().expect("changed tracks old snap"),
                        ))
                    }
                    (new_kind, old_kind) => {
                        panic!("illegal change combination {old_kind:?} then {new_kind:?}")
                    }
                };
                match merged {
                    Some(merged) => {
                        self.changes.insert(child_name, merged);
                    }
                    None => {
                        self.changes.remove(&child_name);
                    }
                }
            }
        }
    }

    pub fn get_changes(self) -> Vec<Change> {
        self.changes.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::node::{Node, Scalar};

    fn leaf(v: i64) -> Node {
        Node::leaf(Scalar::Number(v as f64))
    }

    #[test]
    fn add_after_remove_becomes_change() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_removed("a", leaf(1)));
        acc.track_child_change(Change::child_added("a", leaf(2)));
        let changes = acc.get_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeType::ChildChanged);
        assert_eq!(changes[0].old_snap, Some(leaf(1)));
        assert_eq!(changes[0].snapshot_node, leaf(2));
    }

    #[test]
    fn remove_after_add_cancels_out() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added("a", leaf(1)));
        acc.track_child_change(Change::child_removed("a", leaf(1)));
        assert!(acc.get_changes().is_empty());
    }

    #[test]
    fn remove_after_change_keeps_original_snapshot() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed("a", leaf(2), leaf(1)));
        acc.track_child_change(Change::child_removed("a", leaf(2)));
        let changes = acc.get_changes();
        assert_eq!(changes[0].kind, ChangeType::ChildRemoved);
        assert_eq!(changes[0].snapshot_node, leaf(1));
    }

    #[test]
    fn change_after_change_keeps_oldest_old_snap() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed("a", leaf(2), leaf(1)));
        acc.track_child_change(Change::child_changed("a", leaf(3), leaf(2)));
        let changes = acc.get_changes();
        assert_eq!(changes[0].kind, ChangeType::ChildChanged);
        assert_eq!(changes[0].snapshot_node, leaf(3));
        assert_eq!(changes[0].old_snap, Some(leaf(1)));
    }
}
