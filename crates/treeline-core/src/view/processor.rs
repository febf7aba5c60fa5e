//! Applies operations to a view's caches and collects the changes
//! listeners need to hear about.
//!
//! Server data and the locally visible ("event") data are tracked
//! separately: server updates land in the server cache and are then
//! re-layered with pending writes into the event cache, while user
//! writes touch the event cache directly and reach the server cache
//! only when acknowledged.

use crate::path::Path;
use crate::snap::node::Node;
use crate::view::cache::ViewCache;
use crate::view::change::{Change, ChildChangeAccumulator};
use crate::view::complete_child_source::{
    CompleteChildSource, WriteTreeCompleteChildSource, NO_COMPLETE_CHILD_SOURCE,
};
use crate::view::filter::NodeFilter;
use crate::view::operation::{Operation, OperationSource};
use crate::write::immutable_tree::ImmutableTree;
use crate::write::write_tree::WriteTreeRef;

pub struct ProcessorResult {
    pub view_cache: ViewCache,
    pub changes: Vec<Change>,
}

pub struct ViewProcessor {
    filter: Box<dyn NodeFilter + Send + Sync>,
}

impl ViewProcessor {
    pub fn new(filter: Box<dyn NodeFilter + Send + Sync>) -> ViewProcessor {
        ViewProcessor { filter }
    }

    pub fn assert_indexed(&self, view_cache: &ViewCache) {
        debug_assert!(
            view_cache
                .event_cache()
                .get_node()
                .is_indexed(self.filter.index()),
            "event snap not indexed"
        );
        debug_assert!(
            view_cache
                .server_cache()
                .get_node()
                .is_indexed(self.filter.index()),
            "server snap not indexed"
        );
    }

    pub fn apply_operation(
        &self,
        old_view_cache: &ViewCache,
        operation: &Operation,
        writes_cache: &WriteTreeRef,
        complete_cache: Option<&Node>,
    ) -> ProcessorResult {
        let mut accumulator = ChildChangeAccumulator::new();
        let new_view_cache = match operation {
            Operation::Overwrite { source, path, snap } => match source {
                OperationSource::User => self.apply_user_overwrite(
                    old_view_cache,
                    path,
                    snap,
                    writes_cache,
                    complete_cache,
                    &mut accumulator,
                ),
                OperationSource::Server => {
                    // Once the server cache is filtered, deeper updates
                    // must stay filtered; only a root overwrite makes it
                    // unfiltered again.
                    let filter_server_node =
                        old_view_cache.server_cache().is_filtered() && !path.is_empty();
                    self.apply_server_overwrite(
                        old_view_cache,
                        path,
                        snap,
                        writes_cache,
                        complete_cache,
                        filter_server_node,
                        &mut accumulator,
                    )
                }
            },
            Operation::Merge {
                source,
                path,
                children,
            } => match source {
                OperationSource::User => self.apply_user_merge(
                    old_view_cache,
                    path,
                    children,
                    writes_cache,
                    complete_cache,
                    &mut accumulator,
                ),
                OperationSource::Server => {
                    let filter_server_node = old_view_cache.server_cache().is_filtered();
                    self.apply_server_merge(
                        old_view_cache,
                        path,
                        children,
                        writes_cache,
                        complete_cache,
                        filter_server_node,
                        &mut accumulator,
                    )
                }
            },
            Operation::AckUserWrite {
                path,
                affected_tree,
                revert,
            } => {
                if !revert {
                    self.ack_user_write(
                        old_view_cache,
                        path,
                        affected_tree,
                        writes_cache,
                        complete_cache,
                        &mut accumulator,
                    )
                } else {
                    self.revert_user_write(
                        old_view_cache,
                        path,
                        writes_cache,
                        complete_cache,
                        &mut accumulator,
                    )
                }
            }
            Operation::ListenComplete { path } => {
                self.listen_complete(old_view_cache, path, writes_cache, &mut accumulator)
            }
        };
        let mut changes = accumulator.get_changes();
        Self::maybe_add_value_event(old_view_cache, &new_view_cache, &mut changes);
        ProcessorResult {
            view_cache: new_view_cache,
            changes,
        }
    }

    /// A complete event cache gets a trailing value change whenever
    /// anything observable happened: child changes, first
    /// initialization, a leaf/empty value change, or a priority change.
    fn maybe_add_value_event(
        old_view_cache: &ViewCache,
        new_view_cache: &ViewCache,
        changes: &mut Vec<Change>,
    ) {
        let event_snap = new_view_cache.event_cache();
        if !event_snap.is_fully_initialized() {
            return;
        }
        let event_node = event_snap.get_node();
        let is_leaf_or_empty = event_node.is_leaf() || event_node.is_empty();
        let should_add = !changes.is_empty()
            || !old_view_cache.event_cache().is_fully_initialized()
            || {
                let old_complete = old_view_cache
                    .get_complete_event_snap()
                    .expect("fully initialized cache has a complete snap");
                (is_leaf_or_empty && event_node != old_complete)
                    || event_node.get_priority() != old_complete.get_priority()
            };
        if should_add {
            let complete = new_view_cache
                .get_complete_event_snap()
                .expect("fully initialized cache has a complete snap");
            changes.push(Change::value(complete.clone()));
        }
    }

    fn generate_event_cache_after_server_event(
        &self,
        view_cache: &ViewCache,
        change_path: &Path,
        writes_cache: &WriteTreeRef,
        source: &dyn CompleteChildSource,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_event_snap = view_cache.event_cache();
        if writes_cache.shadowing_write(change_path).is_some() {
            // A pending write hides this change entirely.
            return view_cache.clone();
        }
        let new_event_cache;
        if change_path.is_empty() {
            assert!(
                view_cache.server_cache().is_fully_initialized(),
                "a root change requires complete server data"
            );
            if view_cache.server_cache().is_filtered() {
                // Only layer writes over children known to be complete;
                // deep writes over filtered data may touch children the
                // window never loaded.
                let server_cache = view_cache.get_complete_server_snap();
                let complete_children = match server_cache {
                    Some(node) if !node.is_leaf() => Some(node.clone()),
                    _ => None,
                };
                let complete_event_children =
                    writes_cache.calc_complete_event_children(complete_children.as_ref());
                new_event_cache = self.filter.update_full_node(
                    old_event_snap.get_node(),
                    &complete_event_children,
                    Some(accumulator),
                );
            } else {
                let complete_node = writes_cache
                    .calc_complete_event_cache(view_cache.get_complete_server_snap(), &[], false)
                    .expect("complete server data yields a complete event cache");
                new_event_cache = self.filter.update_full_node(
                    old_event_snap.get_node(),
                    &complete_node,
                    Some(accumulator),
                );
            }
        } else {
            let child_key = change_path.front().expect("non-empty path");
            if child_key == ".priority" {
                assert!(
                    change_path.len() == 1,
                    "a priority path has no further segments"
                );
                let old_event_node = old_event_snap.get_node();
                let server_node = view_cache.server_cache().get_node();
                let updated_priority = writes_cache
                    .calc_event_cache_after_server_overwrite(change_path, server_node);
                new_event_cache = match updated_priority {
                    Some(priority) => self.filter.update_priority(old_event_node, &priority),
                    // Priority shadowed by a write; keep the old node.
                    None => old_event_snap.get_node().clone(),
                };
            } else {
                let child_change_path = change_path.pop_front();
                let new_event_child = if old_event_snap.is_complete_for_child(child_key) {
                    let server_node = view_cache.server_cache().get_node();
                    match writes_cache
                        .calc_event_cache_after_server_overwrite(change_path, server_node)
                    {
                        Some(event_child_update) => Some(
                            old_event_snap
                                .get_node()
                                .get_immediate_child(child_key)
                                .update_child(&child_change_path, &event_child_update),
                        ),
                        None => Some(old_event_snap.get_node().get_immediate_child(child_key)),
                    }
                } else {
                    writes_cache.calc_complete_child(child_key, view_cache.server_cache())
                };
                new_event_cache = match new_event_child {
                    Some(new_child) => self.filter.update_child(
                        old_event_snap.get_node(),
                        child_key,
                        &new_child,
                        &child_change_path,
                        source,
                        Some(accumulator),
                    ),
                    // No complete child available; nothing to update.
                    None => old_event_snap.get_node().clone(),
                };
            }
        }
        view_cache.update_event_snap(
            new_event_cache,
            old_event_snap.is_fully_initialized() || change_path.is_empty(),
            self.filter.filters_nodes(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_server_overwrite(
        &self,
        old_view_cache: &ViewCache,
        change_path: &Path,
        changed_snap: &Node,
        writes_cache: &WriteTreeRef,
        complete_cache: Option<&Node>,
        filter_server_node: bool,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_server_snap = old_view_cache.server_cache();
        let server_filter: &dyn NodeFilter = if filter_server_node {
            &*self.filter
        } else {
            self.filter.indexed_filter()
        };
        let new_server_cache;
        if change_path.is_empty() {
            new_server_cache =
                server_filter.update_full_node(old_server_snap.get_node(), changed_snap, None);
        } else if server_filter.filters_nodes() && !old_server_snap.is_filtered() {
            // First filtered update over an unfiltered cache: replay it
            // as a full update so the whole node gets windowed.
            let new_server_node = old_server_snap
                .get_node()
                .update_child(change_path, changed_snap);
            new_server_cache =
                server_filter.update_full_node(old_server_snap.get_node(), &new_server_node, None);
        } else {
            let child_key = change_path.front().expect("non-empty path");
            if !old_server_snap.is_complete_for_path(change_path) && change_path.len() > 1 {
                // Deep updates meant for other listeners don't apply to
                // incomplete nodes.
                return old_view_cache.clone();
            }
            let child_change_path = change_path.pop_front();
            let child_node = old_server_snap.get_node().get_immediate_child(child_key);
            let new_child_node = child_node.update_child(&child_change_path, changed_snap);
            if child_key == ".priority" {
                new_server_cache =
                    server_filter.update_priority(old_server_snap.get_node(), &new_child_node);
            } else {
                new_server_cache = server_filter.update_child(
                    old_server_snap.get_node(),
                    child_key,
                    &new_child_node,
                    &child_change_path,
                    &NO_COMPLETE_CHILD_SOURCE,
                    None,
                );
            }
        }
        let new_view_cache = old_view_cache.update_server_snap(
            new_server_cache,
            old_server_snap.is_fully_initialized() || change_path.is_empty(),
            server_filter.filters_nodes(),
        );
        let source =
            WriteTreeCompleteChildSource::new(writes_cache, &new_view_cache, complete_cache);
        self.generate_event_cache_after_server_event(
            &new_view_cache,
            change_path,
            writes_cache,
            &source,
            accumulator,
        )
    }

    fn apply_user_overwrite(
        &self,
        old_view_cache: &ViewCache,
        change_path: &Path,
        changed_snap: &Node,
        writes_cache: &WriteTreeRef,
        complete_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_event_snap = old_view_cache.event_cache();
        let source =
            WriteTreeCompleteChildSource::new(writes_cache, old_view_cache, complete_cache);
        if change_path.is_empty() {
            let new_event_cache = self.filter.update_full_node(
                old_event_snap.get_node(),
                changed_snap,
                Some(accumulator),
            );
            return old_view_cache.update_event_snap(
                new_event_cache,
                true,
                self.filter.filters_nodes(),
            );
        }
        let child_key = change_path.front().expect("non-empty path");
        if child_key == ".priority" {
            let new_event_cache = self
                .filter
                .update_priority(old_event_snap.get_node(), changed_snap);
            return old_view_cache.update_event_snap(
                new_event_cache,
                old_event_snap.is_fully_initialized(),
                old_event_snap.is_filtered(),
            );
        }
        let child_change_path = change_path.pop_front();
        let old_child = old_event_snap.get_node().get_immediate_child(child_key);
        let new_child;
        if child_change_path.is_empty() {
            new_child = changed_snap.clone();
        } else {
            match source.get_complete_child(child_key) {
                Some(child_node) => {
                    if child_change_path.back() == Some(".priority")
                        && child_node
                            .get_child(&child_change_path.parent().expect("non-empty path"))
                            .is_empty()
                    {
                        // Priority write on a node that doesn't exist
                        // locally; if it exists on the server the
                        // confirmed update will carry the priority.
                        new_child = child_node;
                    } else {
                        new_child = child_node.update_child(&child_change_path, changed_snap);
                    }
                }
                None => new_child = Node::empty(),
            }
        }
        if old_child == new_child {
            old_view_cache.clone()
        } else {
            let new_event_snap = self.filter.update_child(
                old_event_snap.get_node(),
                child_key,
                &new_child,
                &child_change_path,
                &source,
                Some(accumulator),
            );
            old_view_cache.update_event_snap(
                new_event_snap,
                old_event_snap.is_fully_initialized(),
                self.filter.filters_nodes(),
            )
        }
    }

    fn cache_has_child(view_cache: &ViewCache, child_key: &str) -> bool {
        view_cache.event_cache().is_complete_for_child(child_key)
    }

    fn apply_user_merge(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        changed_children: &ImmutableTree<Node>,
        writes_cache: &WriteTreeRef,
        server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        // With a limit, changes can bump children out of the window and
        // make room for new ones. Process changes to in-view children
        // first so the window has settled before additions land.
        let mut cur_view_cache = view_cache.clone();
        changed_children.foreach(&mut |relative_path, child_node| {
            let write_path = path.child(relative_path);
            if Self::cache_has_child(view_cache, write_path.front().expect("non-empty")) {
                cur_view_cache = self.apply_user_overwrite(
                    &cur_view_cache,
                    &write_path,
                    child_node,
                    writes_cache,
                    server_cache,
                    accumulator,
                );
            }
        });
        changed_children.foreach(&mut |relative_path, child_node| {
            let write_path = path.child(relative_path);
            if !Self::cache_has_child(view_cache, write_path.front().expect("non-empty")) {
                cur_view_cache = self.apply_user_overwrite(
                    &cur_view_cache,
                    &write_path,
                    child_node,
                    writes_cache,
                    server_cache,
                    accumulator,
                );
            }
        });
        cur_view_cache
    }

    fn apply_merge(node: &Node, merge: &ImmutableTree<Node>) -> Node {
        let mut node = node.clone();
        merge.foreach(&mut |relative_path, child_node| {
            node = node.update_child(relative_path, child_node);
        });
        node
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_server_merge(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        changed_children: &ImmutableTree<Node>,
        writes_cache: &WriteTreeRef,
        server_cache: Option<&Node>,
        filter_server_node: bool,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        // No cache yet: this merge belongs to an earlier listen at the
        // same location. The complete update is on its way.
        if view_cache.server_cache().get_node().is_empty()
            && !view_cache.server_cache().is_fully_initialized()
        {
            return view_cache.clone();
        }

        let mut cur_view_cache = view_cache.clone();
        let view_merge_tree = if path.is_empty() {
            changed_children.clone()
        } else {
            ImmutableTree::empty().set_tree(path, changed_children.clone())
        };
        let server_node = view_cache.server_cache().get_node().clone();

        // In-view children first, same reasoning as user merges.
        view_merge_tree.foreach_child(&mut |child_key, child_tree| {
            if server_node.has_child(child_key) {
                let server_child = view_cache
                    .server_cache()
                    .get_node()
                    .get_immediate_child(child_key);
                let new_child = Self::apply_merge(&server_child, child_tree);
                cur_view_cache = self.apply_server_overwrite(
                    &cur_view_cache,
                    &Path::new(child_key),
                    &new_child,
                    writes_cache,
                    server_cache,
                    filter_server_node,
                    accumulator,
                );
            }
        });
        view_merge_tree.foreach_child(&mut |child_key, child_tree| {
            let is_unknown_deep_merge = !view_cache.server_cache().is_complete_for_child(child_key)
                && child_tree.value().is_none();
            if !server_node.has_child(child_key) && !is_unknown_deep_merge {
                let server_child = view_cache
                    .server_cache()
                    .get_node()
                    .get_immediate_child(child_key);
                let new_child = Self::apply_merge(&server_child, child_tree);
                cur_view_cache = self.apply_server_overwrite(
                    &cur_view_cache,
                    &Path::new(child_key),
                    &new_child,
                    writes_cache,
                    server_cache,
                    filter_server_node,
                    accumulator,
                );
            }
        });

        cur_view_cache
    }

    fn ack_user_write(
        &self,
        view_cache: &ViewCache,
        ack_path: &Path,
        affected_tree: &ImmutableTree<bool>,
        writes_cache: &WriteTreeRef,
        complete_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        if writes_cache.shadowing_write(ack_path).is_some() {
            return view_cache.clone();
        }
        // Re-apply the confirmed server state beneath the ack now that
        // the pending write no longer shadows it.
        let filter_server_node = view_cache.server_cache().is_filtered();
        let server_cache = view_cache.server_cache();
        if affected_tree.value().is_some() {
            // The ack covers a whole overwrite.
            if (ack_path.is_empty() && server_cache.is_fully_initialized())
                || server_cache.is_complete_for_path(ack_path)
            {
                return self.apply_server_overwrite(
                    view_cache,
                    ack_path,
                    &server_cache.get_node().get_child(ack_path),
                    writes_cache,
                    complete_cache,
                    filter_server_node,
                    accumulator,
                );
            }
            if ack_path.is_empty() {
                // Acked data at the root without complete data: re-apply
                // the children we do have as a merge.
                let mut changed_children = ImmutableTree::empty();
                server_cache.get_node().for_each_child(
                    &crate::snap::index::Index::Key,
                    &mut |name, node| {
                        changed_children = changed_children.set(&Path::new(name), node.clone());
                        false
                    },
                );
                return self.apply_server_merge(
                    view_cache,
                    ack_path,
                    &changed_children,
                    writes_cache,
                    complete_cache,
                    filter_server_node,
                    accumulator,
                );
            }
            return view_cache.clone();
        }
        // The ack covers a merge; re-apply each complete piece.
        let mut changed_children = ImmutableTree::empty();
        affected_tree.foreach(&mut |merge_path, _| {
            let server_cache_path = ack_path.child(merge_path);
            if server_cache.is_complete_for_path(&server_cache_path) {
                changed_children = changed_children.set(
                    merge_path,
                    server_cache.get_node().get_child(&server_cache_path),
                );
            }
        });
        self.apply_server_merge(
            view_cache,
            ack_path,
            &changed_children,
            writes_cache,
            complete_cache,
            filter_server_node,
            accumulator,
        )
    }

    fn listen_complete(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        writes_cache: &WriteTreeRef,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        let old_server_node = view_cache.server_cache();
        let new_view_cache = view_cache.update_server_snap(
            old_server_node.get_node().clone(),
            old_server_node.is_fully_initialized() || path.is_empty(),
            old_server_node.is_filtered(),
        );
        self.generate_event_cache_after_server_event(
            &new_view_cache,
            path,
            writes_cache,
            &NO_COMPLETE_CHILD_SOURCE,
            accumulator,
        )
    }

    fn revert_user_write(
        &self,
        view_cache: &ViewCache,
        path: &Path,
        writes_cache: &WriteTreeRef,
        complete_server_cache: Option<&Node>,
        accumulator: &mut ChildChangeAccumulator,
    ) -> ViewCache {
        if writes_cache.shadowing_write(path).is_some() {
            return view_cache.clone();
        }
        let source =
            WriteTreeCompleteChildSource::new(writes_cache, view_cache, complete_server_cache);
        let old_event_cache = view_cache.event_cache().get_node().clone();
        let mut new_event_cache;
        if path.is_empty() || path.front() == Some(".priority") {
            let new_node = if view_cache.server_cache().is_fully_initialized() {
                writes_cache
                    .calc_complete_event_cache(view_cache.get_complete_server_snap(), &[], false)
                    .expect("complete server data yields a complete event cache")
            } else {
                let server_children = view_cache.server_cache().get_node();
                assert!(
                    !server_children.is_leaf(),
                    "an incomplete server cache cannot be a leaf"
                );
                writes_cache.calc_complete_event_children(Some(server_children))
            };
            new_event_cache =
                self.filter
                    .update_full_node(&old_event_cache, &new_node, Some(accumulator));
        } else {
            let child_key = path.front().expect("non-empty path");
            let mut new_child =
                writes_cache.calc_complete_child(child_key, view_cache.server_cache());
            if new_child.is_none() && view_cache.server_cache().is_complete_for_child(child_key) {
                new_child = Some(old_event_cache.get_immediate_child(child_key));
            }
            match new_child {
                Some(new_child) => {
                    new_event_cache = self.filter.update_child(
                        &old_event_cache,
                        child_key,
                        &new_child,
                        &path.pop_front(),
                        &source,
                        Some(&mut *accumulator),
                    );
                }
                None => {
                    if view_cache.event_cache().get_node().has_child(child_key) {
                        // No complete replacement; drop the child.
                        new_event_cache = self.filter.update_child(
                            &old_event_cache,
                            child_key,
                            &Node::empty(),
                            &path.pop_front(),
                            &source,
                            Some(&mut *accumulator),
                        );
                    } else {
                        new_event_cache = old_event_cache.clone();
                    }
                }
            }
            if new_event_cache.is_empty() && view_cache.server_cache().is_fully_initialized() {
                // Reverting may have dropped every child write; the
                // underlying value might be a leaf again.
                let complete = writes_cache
                    .calc_complete_event_cache(view_cache.get_complete_server_snap(), &[], false)
                    .expect("complete server data yields a complete event cache");
                if complete.is_leaf() {
                    new_event_cache = self.filter.update_full_node(
                        &new_event_cache,
                        &complete,
                        Some(accumulator),
                    );
                }
            }
        }
        let complete = view_cache.server_cache().is_fully_initialized()
            || writes_cache.shadowing_write(&Path::root()).is_some();
        view_cache.update_event_snap(new_event_cache, complete, self.filter.filters_nodes())
    }
}
