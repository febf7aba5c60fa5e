//! A set of path-keyed node writes that can be applied in one pass.
//!
//! Writes at an ancestor shadow writes below them, so adding a write
//! under an existing one folds it into the ancestor's node instead of
//! growing the tree. Applying a compound write overlays every write on
//! a base snapshot, deepest-independent paths first, with `.priority`
//! writes deferred until the target node is known to exist.

use crate::path::Path;
use crate::snap::node::{NamedNode, Node};
use crate::write::immutable_tree::ImmutableTree;

#[derive(Clone, Default)]
pub struct CompoundWrite {
    writes: ImmutableTree<Node>,
}

impl CompoundWrite {
    pub fn empty() -> CompoundWrite {
        CompoundWrite {
            writes: ImmutableTree::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    #[must_use]
    pub fn add_write(&self, path: &Path, node: &Node) -> CompoundWrite {
        if path.is_empty() {
            return CompoundWrite {
                writes: ImmutableTree::leaf(node.clone()),
            };
        }
        match self.writes.find_root_most(path) {
            Some((root_most_path, value)) => {
                let relative = Path::relative(&root_most_path, path);
                let updated = value.update_child(&relative, node);
                CompoundWrite {
                    writes: self.writes.set(&root_most_path, updated),
                }
            }
            None => CompoundWrite {
                writes: self.writes.set_tree(path, ImmutableTree::leaf(node.clone())),
            },
        }
    }

    #[must_use]
    pub fn add_writes<'a, I>(&self, path: &Path, children: I) -> CompoundWrite
    where
        I: IntoIterator<Item = (&'a String, &'a Node)>,
    {
        let mut write = self.clone();
        for (name, node) in children {
            write = write.add_write(&path.child_name(name), node);
        }
        write
    }

    /// Drops the write at exactly `path`. Writes above it still shadow
    /// the location; writes below it survive. Removing the root write
    /// clears everything.
    #[must_use]
    pub fn remove_write(&self, path: &Path) -> CompoundWrite {
        if path.is_empty() {
            CompoundWrite::empty()
        } else {
            CompoundWrite {
                writes: self.writes.set_tree(path, ImmutableTree::empty()),
            }
        }
    }

    /// Whether this write fully determines the node at `path`.
    pub fn has_complete_write(&self, path: &Path) -> bool {
        self.get_complete_node(path).is_some()
    }

    /// The node at `path` if some write at or above it pins it down.
    pub fn get_complete_node(&self, path: &Path) -> Option<Node> {
        let (root_most_path, value) = self.writes.find_root_most(path)?;
        let relative = Path::relative(&root_most_path, path);
        Some(value.get_child(&relative))
    }

    /// Children complete at the top level of this write.
    pub fn get_complete_children(&self) -> Vec<NamedNode> {
        let mut children = Vec::new();
        if let Some(node) = self.writes.value() {
            node.for_each_child(&crate::snap::index::Index::Priority, &mut |name, child| {
                children.push(NamedNode::new(name, child.clone()));
                false
            });
        } else {
            self.writes.foreach_child(&mut |name, tree| {
                if let Some(value) = tree.value() {
                    children.push(NamedNode::new(name, value.clone()));
                }
            });
        }
        children
    }

    /// The writes visible from `path` downward.
    #[must_use]
    pub fn child_compound_write(&self, path: &Path) -> CompoundWrite {
        if path.is_empty() {
            return self.clone();
        }
        match self.get_complete_node(path) {
            Some(shadowing) => CompoundWrite {
                writes: ImmutableTree::leaf(shadowing),
            },
            None => CompoundWrite {
                writes: self.writes.subtree(path),
            },
        }
    }

    /// Overlays every write on `node`.
    pub fn apply(&self, node: &Node) -> Node {
        apply_subtree_write(&Path::root(), &self.writes, node.clone())
    }
}

fn apply_subtree_write(relative_path: &Path, write_tree: &ImmutableTree<Node>, node: Node) -> Node {
    if let Some(value) = write_tree.value() {
        // A write at this point shadows the whole subtree.
        return node.update_child(relative_path, value);
    }
    let mut node = node;
    let mut priority_write: Option<Node> = None;
    write_tree.foreach_child(&mut |child_name, child_tree| {
        if child_name == ".priority" {
            // Deferred: a priority write only lands on a node that
            // exists once all other writes are in.
            priority_write = child_tree.value().cloned();
        } else {
            node = apply_subtree_write(&relative_path.child_name(child_name), child_tree, node.clone());
        }
    });
    if let Some(priority) = priority_write {
        if !node.get_child(relative_path).is_empty() {
            node = node.update_child(&relative_path.child_name(".priority"), &priority);
        }
    }
    node
}
