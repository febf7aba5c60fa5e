//! Ledger of local writes that have not been acknowledged yet.
//!
//! Every optimistic write is recorded with a strictly increasing id and
//! folded into a [`CompoundWrite`] of currently visible writes. Views
//! ask this ledger to overlay pending writes on server state; when the
//! server acknowledges or rejects a write it is removed, which may
//! require relayering the remaining writes if they overlapped.

use crate::path::Path;
use crate::snap::index::Index;
use crate::snap::node::{NamedNode, Node};
use crate::view::cache::CacheNode;
use crate::write::compound_write::CompoundWrite;

/// One recorded user write.
#[derive(Clone, Debug)]
pub struct WriteRecord {
    pub write_id: u64,
    pub path: Path,
    pub payload: WritePayload,
    pub visible: bool,
}

#[derive(Clone, Debug)]
pub enum WritePayload {
    Overwrite(Node),
    Merge(Vec<(String, Node)>),
}

impl WriteRecord {
    /// Whether this record fully determines the node at `path`.
    fn contains_path(&self, path: &Path) -> bool {
        match &self.payload {
            WritePayload::Overwrite(_) => self.path.contains(path),
            WritePayload::Merge(children) => children
                .iter()
                .any(|(name, _)| self.path.child_name(name).contains(path)),
        }
    }
}

#[derive(Default)]
pub struct WriteTree {
    visible_writes: CompoundWrite,
    all_writes: Vec<WriteRecord>,
    last_write_id: Option<u64>,
}

impl WriteTree {
    pub fn new() -> WriteTree {
        WriteTree {
            visible_writes: CompoundWrite::empty(),
            all_writes: Vec::new(),
            last_write_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_writes.is_empty()
    }

    fn assert_new_write_id(&self, write_id: u64) {
        assert!(
            self.last_write_id.map_or(true, |last| write_id > last),
            "write ids must be issued in increasing order"
        );
    }

    /// Records an optimistic overwrite of the subtree at `path`.
    pub fn add_overwrite(&mut self, path: Path, snap: Node, write_id: u64, visible: bool) {
        self.assert_new_write_id(write_id);
        if visible {
            self.visible_writes = self.visible_writes.add_write(&path, &snap);
        }
        self.all_writes.push(WriteRecord {
            write_id,
            path,
            payload: WritePayload::Overwrite(snap),
            visible,
        });
        self.last_write_id = Some(write_id);
    }

    /// Records an optimistic merge of named children under `path`.
    pub fn add_merge(&mut self, path: Path, children: Vec<(String, Node)>, write_id: u64) {
        self.assert_new_write_id(write_id);
        self.visible_writes = self
            .visible_writes
            .add_writes(&path, children.iter().map(|(k, v)| (k, v)));
        self.all_writes.push(WriteRecord {
            write_id,
            path,
            payload: WritePayload::Merge(children),
            visible: true,
        });
        self.last_write_id = Some(write_id);
    }

    pub fn get_write(&self, write_id: u64) -> Option<&WriteRecord> {
        self.all_writes.iter().find(|w| w.write_id == write_id)
    }

    /// Removes an acknowledged or rejected write.
    ///
    /// Returns `true` when the removal may have changed what views see
    /// at the write's path, in which case caches must be reprocessed.
    pub fn remove_write(&mut self, write_id: u64) -> bool {
        let idx = self
            .all_writes
            .iter()
            .position(|w| w.write_id == write_id)
            .expect("removed write must exist");
        let removed = self.all_writes.remove(idx);

        let mut removed_write_was_visible = removed.visible;
        let mut removed_write_overlaps = false;
        let mut i = self.all_writes.len();
        while removed_write_was_visible && i > 0 {
            i -= 1;
            let current = &self.all_writes[i];
            if !current.visible {
                continue;
            }
            if i >= idx && current.contains_path(&removed.path) {
                // A later write completely shadows the removed one.
                removed_write_was_visible = false;
            } else if removed.path.contains(&current.path) {
                removed_write_overlaps = true;
            }
        }

        if !removed_write_was_visible {
            false
        } else if removed_write_overlaps {
            self.visible_writes = layer_tree(&self.all_writes, &|w| w.visible, &Path::root());
            true
        } else {
            match &removed.payload {
                WritePayload::Overwrite(_) => {
                    self.visible_writes = self.visible_writes.remove_write(&removed.path);
                }
                WritePayload::Merge(children) => {
                    for (name, _) in children {
                        self.visible_writes = self
                            .visible_writes
                            .remove_write(&removed.path.child_name(name));
                    }
                }
            }
            true
        }
    }

    /// The node at `path` if pending writes fully determine it.
    pub fn get_complete_write_data(&self, path: &Path) -> Option<Node> {
        self.visible_writes.get_complete_node(path)
    }

    /// Pending write shadowing `path` entirely, if any.
    pub fn shadowing_write(&self, path: &Path) -> Option<Node> {
        self.visible_writes.get_complete_node(path)
    }

    /// The complete view of `tree_path` after overlaying pending writes
    /// on `complete_server_cache`, or `None` when neither side pins the
    /// node down.
    ///
    /// `write_ids_to_exclude` leaves specific writes out (used when
    /// reverting); `include_hidden_writes` also layers writes recorded
    /// as invisible.
    pub fn calc_complete_event_cache(
        &self,
        tree_path: &Path,
        complete_server_cache: Option<&Node>,
        write_ids_to_exclude: &[u64],
        include_hidden_writes: bool,
    ) -> Option<Node> {
        if write_ids_to_exclude.is_empty() && !include_hidden_writes {
            if let Some(shadowing) = self.visible_writes.get_complete_node(tree_path) {
                return Some(shadowing);
            }
            let sub_merge = self.visible_writes.child_compound_write(tree_path);
            if sub_merge.is_empty() {
                return complete_server_cache.cloned();
            }
            if complete_server_cache.is_none() && !sub_merge.has_complete_write(&Path::root()) {
                return None;
            }
            let layered = complete_server_cache.cloned().unwrap_or_else(Node::empty);
            Some(sub_merge.apply(&layered))
        } else {
            let merge = self.visible_writes.child_compound_write(tree_path);
            if !include_hidden_writes && merge.is_empty() {
                return complete_server_cache.cloned();
            }
            if !include_hidden_writes
                && complete_server_cache.is_none()
                && !merge.has_complete_write(&Path::root())
            {
                return None;
            }
            let filter = |w: &WriteRecord| {
                (w.visible || include_hidden_writes)
                    && !write_ids_to_exclude.contains(&w.write_id)
                    && (w.path.contains(tree_path) || tree_path.contains(&w.path))
            };
            let merge_at_path = layer_tree(&self.all_writes, &filter, tree_path);
            let layered = complete_server_cache.cloned().unwrap_or_else(Node::empty);
            Some(merge_at_path.apply(&layered))
        }
    }

    /// Children of `tree_path` that pending writes plus (optionally
    /// known) server children make complete.
    pub fn calc_complete_event_children(
        &self,
        tree_path: &Path,
        complete_server_children: Option<&Node>,
    ) -> Node {
        let mut complete_children = Node::empty();
        if let Some(top_level_set) = self.visible_writes.get_complete_node(tree_path) {
            if !top_level_set.is_leaf() {
                top_level_set.for_each_child(&Index::Priority, &mut |name, node| {
                    complete_children = complete_children.update_immediate_child(name, node);
                    false
                });
            }
            return complete_children;
        }
        let merge = self.visible_writes.child_compound_write(tree_path);
        if let Some(server_children) = complete_server_children {
            server_children.for_each_child(&Index::Priority, &mut |name, node| {
                let merged = merge
                    .child_compound_write(&Path::new(name))
                    .apply(node);
                complete_children = complete_children.update_immediate_child(name, &merged);
                false
            });
        }
        for named in merge.get_complete_children() {
            complete_children = complete_children.update_immediate_child(&named.name, &named.node);
        }
        complete_children
    }

    /// What the event cache under `tree_path` shows at `child_path`
    /// after a server overwrite there, or `None` when a pending write
    /// shadows the location (no event results).
    pub fn calc_event_cache_after_server_overwrite(
        &self,
        tree_path: &Path,
        child_path: &Path,
        existing_server_snap: &Node,
    ) -> Option<Node> {
        let path = tree_path.child(child_path);
        if self.visible_writes.has_complete_write(&path) {
            return None;
        }
        let child_merge = self.visible_writes.child_compound_write(&path);
        if child_merge.is_empty() {
            Some(existing_server_snap.get_child(child_path))
        } else {
            Some(child_merge.apply(&existing_server_snap.get_child(child_path)))
        }
    }

    /// A complete view of the child, from pending writes alone or
    /// layered over complete server data.
    pub fn calc_complete_child(
        &self,
        tree_path: &Path,
        child_key: &str,
        existing_server_cache: &CacheNode,
    ) -> Option<Node> {
        let path = tree_path.child_name(child_key);
        if let Some(shadowing) = self.visible_writes.get_complete_node(&path) {
            return Some(shadowing);
        }
        if existing_server_cache.is_complete_for_child(child_key) {
            let child_merge = self.visible_writes.child_compound_write(&path);
            Some(child_merge.apply(&existing_server_cache.get_node().get_immediate_child(child_key)))
        } else {
            None
        }
    }

    /// Up to `count` children after `start_post` (exclusive) in index
    /// order, from the write-layered view of `tree_path`.
    pub fn calc_indexed_slice(
        &self,
        tree_path: &Path,
        complete_server_data: Option<&Node>,
        start_post: &NamedNode,
        count: usize,
        reverse: bool,
        index: &Index,
    ) -> Vec<NamedNode> {
        let merge = self.visible_writes.child_compound_write(tree_path);
        let to_iterate = match merge.get_complete_node(&Path::root()) {
            Some(shadowing) => shadowing,
            None => match complete_server_data {
                Some(server) => merge.apply(server),
                None => return Vec::new(),
            },
        };
        let to_iterate = to_iterate.with_index(index);
        if to_iterate.is_empty() || to_iterate.is_leaf() {
            return Vec::new();
        }
        let mut nodes = Vec::new();
        for next in to_iterate.iter_children_from(index, start_post, reverse) {
            if nodes.len() >= count {
                break;
            }
            if index.compare(&next, start_post) != std::cmp::Ordering::Equal {
                nodes.push(next);
            }
        }
        nodes
    }
}

/// Layers `writes` on top of each other as seen from `tree_root`,
/// ignoring records rejected by `filter`.
fn layer_tree(
    writes: &[WriteRecord],
    filter: &dyn Fn(&WriteRecord) -> bool,
    tree_root: &Path,
) -> CompoundWrite {
    let mut compound_write = CompoundWrite::empty();
    for write in writes {
        if !filter(write) {
            continue;
        }
        match &write.payload {
            WritePayload::Overwrite(snap) => {
                if tree_root.contains(&write.path) {
                    let relative = Path::relative(tree_root, &write.path);
                    compound_write = compound_write.add_write(&relative, snap);
                } else if write.path.contains(tree_root) {
                    let relative = Path::relative(&write.path, tree_root);
                    compound_write =
                        compound_write.add_write(&Path::root(), &snap.get_child(&relative));
                }
                // Else: unrelated to this subtree.
            }
            WritePayload::Merge(children) => {
                if tree_root.contains(&write.path) {
                    let relative = Path::relative(tree_root, &write.path);
                    compound_write =
                        compound_write.add_writes(&relative, children.iter().map(|(k, v)| (k, v)));
                } else if write.path.contains(tree_root) {
                    let relative = Path::relative(&write.path, tree_root);
                    if relative.is_empty() {
                        compound_write = compound_write
                            .add_writes(&Path::root(), children.iter().map(|(k, v)| (k, v)));
                    } else if let Some(front) = relative.front() {
                        if let Some((_, child)) =
                            children.iter().find(|(name, _)| name == front)
                        {
                            let deep = child.get_child(&relative.pop_front());
                            compound_write = compound_write.add_write(&Path::root(), &deep);
                        }
                    }
                }
            }
        }
    }
    compound_write
}

/// A [`WriteTree`] scoped to the path a view lives at.
pub struct WriteTreeRef<'a> {
    pub tree_path: Path,
    pub write_tree: &'a WriteTree,
}

impl<'a> WriteTreeRef<'a> {
    pub fn new(tree_path: Path, write_tree: &'a WriteTree) -> WriteTreeRef<'a> {
        WriteTreeRef {
            tree_path,
            write_tree,
        }
    }

    pub fn calc_complete_event_cache(
        &self,
        complete_server_cache: Option<&Node>,
        write_ids_to_exclude: &[u64],
        include_hidden_writes: bool,
    ) -> Option<Node> {
        self.write_tree.calc_complete_event_cache(
            &self.tree_path,
            complete_server_cache,
            write_ids_to_exclude,
            include_hidden_writes,
        )
    }

    pub fn calc_complete_event_children(
        &self,
        complete_server_children: Option<&Node>,
    ) -> Node {
        self.write_tree
            .calc_complete_event_children(&self.tree_path, complete_server_children)
    }

    pub fn calc_event_cache_after_server_overwrite(
        &self,
        path: &Path,
        existing_server_snap: &Node,
    ) -> Option<Node> {
        self.write_tree.calc_event_cache_after_server_overwrite(
            &self.tree_path,
            path,
            existing_server_snap,
        )
    }

    pub fn shadowing_write(&self, path: &Path) -> Option<Node> {
        self.write_tree
            .shadowing_write(&self.tree_path.child(path))
    }

    pub fn calc_indexed_slice(
        &self,
        complete_server_data: Option<&Node>,
        start_post: &NamedNode,
        count: usize,
        reverse: bool,
        index: &Index,
    ) -> Vec<NamedNode> {
        self.write_tree.calc_indexed_slice(
            &self.tree_path,
            complete_server_data,
            start_post,
            count,
            reverse,
            index,
        )
    }

    pub fn calc_complete_child(
        &self,
        child_key: &str,
        existing_server_cache: &CacheNode,
    ) -> Option<Node> {
        self.write_tree
            .calc_complete_child(&self.tree_path, child_key, existing_server_cache)
    }

    /// Ref for a child location of this one.
    pub fn child(&self, child_name: &str) -> WriteTreeRef<'a> {
        WriteTreeRef {
            tree_path: self.tree_path.child_name(child_name),
            write_tree: self.write_tree,
        }
    }
}
