//! Operations flowing into a view: optimistic user edits, confirmed
//! server updates, acknowledgements and listen completions.

use crate::path::Path;
use crate::snap::node::Node;
use crate::write::immutable_tree::ImmutableTree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationSource {
    User,
    Server,
}

#[derive(Clone)]
pub enum Operation {
    Overwrite {
        source: OperationSource,
        path: Path,
        snap: Node,
    },
    Merge {
        source: OperationSource,
        path: Path,
        children: ImmutableTree<Node>,
    },
    /// Server acknowledged the user write(s) covering `affected_tree`.
    /// With `revert` set the write failed and its effects are undone.
    AckUserWrite {
        path: Path,
        affected_tree: ImmutableTree<bool>,
        revert: bool,
    },
    /// Server finished sending the initial data for a listen.
    ListenComplete { path: Path },
}

impl Operation {
    pub fn path(&self) -> &Path {
        match self {
            Operation::Overwrite { path, .. }
            | Operation::Merge { path, .. }
            | Operation::AckUserWrite { path, .. }
            | Operation::ListenComplete { path } => path,
        }
    }

    /// The operation as seen from the child `child_name` of its
    /// location, or `None` when the child is unaffected.
    pub fn operation_for_child(&self, child_name: &str) -> Option<Operation> {
        match self {
            Operation::Overwrite { source, path, snap } => {
                if path.is_empty() {
                    Some(Operation::Overwrite {
                        source: *source,
                        path: Path::root(),
                        snap: snap.get_immediate_child(child_name),
                    })
                } else {
                    debug_assert_eq!(path.front(), Some(child_name));
                    Some(Operation::Overwrite {
                        source: *source,
                        path: path.pop_front(),
                        snap: snap.clone(),
                    })
                }
            }
            Operation::Merge {
                source,
                path,
                children,
            } => {
                if path.is_empty() {
                    let child_tree = children.subtree(&Path::new(child_name));
                    if child_tree.is_empty() {
                        None
                    } else if let Some(value) = child_tree.value() {
                        Some(Operation::Overwrite {
                            source: *source,
                            path: Path::root(),
                            snap: value.clone(),
                        })
                    } else {
                        Some(Operation::Merge {
                            source: *source,
                            path: Path::root(),
                            children: child_tree,
                        })
                    }
                } else {
                    debug_assert_eq!(path.front(), Some(child_name));
                    Some(Operation::Merge {
                        source: *source,
                        path: path.pop_front(),
                        children: children.clone(),
                    })
                }
            }
            Operation::AckUserWrite {
                path,
                affected_tree,
                revert,
            } => {
                if !path.is_empty() {
                    debug_assert_eq!(path.front(), Some(child_name));
                    Some(Operation::AckUserWrite {
                        path: path.pop_front(),
                        affected_tree: affected_tree.clone(),
                        revert: *revert,
                    })
                } else if affected_tree.value().is_some() {
                    // The ack covers this whole subtree.
                    Some(self.clone())
                } else {
                    let child_tree = affected_tree.subtree(&Path::new(child_name));
                    if child_tree.is_empty() {
                        None
                    } else {
                        Some(Operation::AckUserWrite {
                            path: Path::root(),
                            affected_tree: child_tree,
                            revert: *revert,
                        })
                    }
                }
            }
            Operation::ListenComplete { path } => {
                if path.is_empty() {
                    Some(Operation::ListenComplete { path: Path::root() })
                } else {
                    Some(Operation::ListenComplete {
                        path: path.pop_front(),
                    })
                }
            }
        }
    }
}
