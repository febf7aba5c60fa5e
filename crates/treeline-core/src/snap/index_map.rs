//! Per-node registry of materialized index views.
//!
//! Each interior node carries a map from index name to either a sorted
//! view of its children under that index or a fallback marker meaning
//! "no child carries an indexed value, key order is index order". Views
//! are maintained incrementally as children change and shared across
//! node versions like everything else in the tree.

use std::collections::HashMap;
use std::sync::Arc;

use treeline_ordered_map::OrderedMap;

use crate::snap::index::{Index, IndexPost};
use crate::snap::node::{NamedNode, Node};

#[derive(Clone)]
enum IndexState {
    /// Index is tracked but no child defines a value for it.
    Fallback,
    Indexed(OrderedMap<IndexPost, Node>),
}

#[derive(Clone)]
pub struct IndexMap {
    entries: Arc<HashMap<String, (Index, IndexState)>>,
}

impl IndexMap {
    /// Registry tracking only the priority index, unmaterialized.
    pub fn default_map() -> IndexMap {
        static KEY: &str = ".priority";
        let mut entries = HashMap::new();
        entries.insert(KEY.to_string(), (Index::Priority, IndexState::Fallback));
        IndexMap {
            entries: Arc::new(entries),
        }
    }

    /// Registry for a fresh child map: the priority view is built
    /// eagerly when any child carries a priority.
    pub fn for_children(children: &OrderedMap<String, Node>) -> IndexMap {
        let mut any_priority = false;
        children.inorder_traversal(&mut |_, child: &Node| {
            if !child.get_priority().is_empty() {
                any_priority = true;
            }
            any_priority
        });
        let map = IndexMap::default_map();
        if any_priority {
            map.with_index(&Index::Priority, children)
        } else {
            map
        }
    }

    pub fn has_index(&self, index: &Index) -> bool {
        self.entries.contains_key(&index.query_string())
    }

    /// Sorted view for `index`, or `None` when iteration should fall
    /// back to key order.
    pub fn resolve(&self, index: &Index) -> Option<&OrderedMap<IndexPost, Node>> {
        match self.entries.get(&index.query_string()) {
            Some((_, IndexState::Indexed(map))) => Some(map),
            _ => None,
        }
    }

    /// Registry that additionally tracks `index` over `children`.
    pub fn with_index(&self, index: &Index, children: &OrderedMap<String, Node>) -> IndexMap {
        debug_assert!(!matches!(index, Index::Key), "key order needs no view");
        let state = build_view(index, children);
        let mut entries: HashMap<String, (Index, IndexState)> = (*self.entries).clone();
        entries.insert(index.query_string(), (index.clone(), state));
        IndexMap {
            entries: Arc::new(entries),
        }
    }

    /// Updates every tracked view for a child being added or replaced.
    /// `children` is the child map from **before** the update.
    pub fn add_to_indexes(
        &self,
        named: &NamedNode,
        children: &OrderedMap<String, Node>,
    ) -> IndexMap {
        let mut entries: HashMap<String, (Index, IndexState)> = HashMap::new();
        for (key, (index, state)) in self.entries.iter() {
            let new_state = match state {
                IndexState::Fallback => {
                    if index.is_defined_on(&named.node) {
                        // First indexed child; materialize the view.
                        let mut map: OrderedMap<IndexPost, Node> = OrderedMap::new();
                        children.inorder_traversal(&mut |name: &String, child: &Node| {
                            if name != &named.name {
                                map = map.insert(IndexPost::new(index, name, child), child.clone());
                            }
                            false
                        });
                        map = map.insert(
                            IndexPost::new(index, &named.name, &named.node),
                            named.node.clone(),
                        );
                        IndexState::Indexed(map)
                    } else {
                        IndexState::Fallback
                    }
                }
                IndexState::Indexed(map) => {
                    let mut map = map.clone();
                    if let Some(existing) = children.get(&named.name) {
                        map = map.remove(&IndexPost::new(index, &named.name, existing));
                    }
                    map = map.insert(
                        IndexPost::new(index, &named.name, &named.node),
                        named.node.clone(),
                    );
                    IndexState::Indexed(map)
                }
            };
            entries.insert(key.clone(), (index.clone(), new_state));
        }
        IndexMap {
            entries: Arc::new(entries),
        }
    }

    /// Updates every tracked view for a child being removed.
    pub fn remove_from_indexes(
        &self,
        named: &NamedNode,
        children: &OrderedMap<String, Node>,
    ) -> IndexMap {
        let mut entries: HashMap<String, (Index, IndexState)> = HashMap::new();
        for (key, (index, state)) in self.entries.iter() {
            let new_state = match state {
                IndexState::Fallback => IndexState::Fallback,
                IndexState::Indexed(map) => match children.get(&named.name) {
                    Some(existing) => IndexState::Indexed(
                        map.remove(&IndexPost::new(index, &named.name, existing)),
                    ),
                    None => IndexState::Indexed(map.clone()),
                },
            };
            entries.insert(key.clone(), (index.clone(), new_state));
        }
        IndexMap {
            entries: Arc::new(entries),
        }
    }
}

fn build_view(index: &Index, children: &OrderedMap<String, Node>) -> IndexState {
    let mut defined = false;
    children.inorder_traversal(&mut |_, child: &Node| {
        if index.is_defined_on(child) {
            defined = true;
        }
        defined
    });
    if !defined {
        return IndexState::Fallback;
    }
    let mut map: OrderedMap<IndexPost, Node> = OrderedMap::new();
    children.inorder_traversal(&mut |name: &String, child: &Node| {
        map = map.insert(IndexPost::new(index, name, child), child.clone());
        false
    });
    IndexState::Indexed(map)
}
