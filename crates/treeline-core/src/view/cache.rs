//! Cached state a view maintains for its location.

use crate::path::Path;
use crate::snap::node::Node;

/// A node plus how much of it can be trusted.
///
/// `fully_initialized` says whether the node represents complete data
/// for the location; `filtered` says whether a windowing filter dropped
/// children, in which case only individually present children are
/// complete.
#[derive(Clone, Debug)]
pub struct CacheNode {
    node: Node,
    fully_initialized: bool,
    filtered: bool,
}

impl CacheNode {
    pub fn new(node: Node, fully_initialized: bool, filtered: bool) -> CacheNode {
        CacheNode {
            node,
            fully_initialized,
            filtered,
        }
    }

    pub fn empty() -> CacheNode {
        CacheNode::new(Node::empty(), false, false)
    }

    pub fn get_node(&self) -> &Node {
        &self.node
    }

    pub fn is_fully_initialized(&self) -> bool {
        self.fully_initialized
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn is_complete_for_path(&self, path: &Path) -> bool {
        match path.front() {
            None => self.fully_initialized && !self.filtered,
            Some(front) => self.is_complete_for_child(front),
        }
    }

    pub fn is_complete_for_child(&self, key: &str) -> bool {
        (self.fully_initialized && !self.filtered) || self.node.has_child(key)
    }
}

/// The pair of caches behind a view: what listeners have been shown and
/// what the server has confirmed.
#[derive(Clone, Debug)]
pub struct ViewCache {
    event_cache: CacheNode,
    server_cache: CacheNode,
}

impl ViewCache {
    pub fn new(event_cache: CacheNode, server_cache: CacheNode) -> ViewCache {
        ViewCache {
            event_cache,
            server_cache,
        }
    }

    pub fn event_cache(&self) -> &CacheNode {
        &self.event_cache
    }

    pub fn server_cache(&self) -> &CacheNode {
        &self.server_cache
    }

    #[must_use]
    pub fn update_event_snap(
        &self,
        event_snap: Node,
        complete: bool,
        filtered: bool,
    ) -> ViewCache {
        ViewCache {
            event_cache: CacheNode::new(event_snap, complete, filtered),
            server_cache: self.server_cache.clone(),
        }
    }

    #[must_use]
    pub fn update_server_snap(
        &self,
        server_snap: Node,
        complete: bool,
        filtered: bool,
    ) -> ViewCache {
        ViewCache {
            event_cache: self.event_cache.clone(),
            server_cache: CacheNode::new(server_snap, complete, filtered),
        }
    }

    /// The event cache node, only if it is complete.
    pub fn get_complete_event_snap(&self) -> Option<&Node> {
        if self.event_cache.is_fully_initialized() {
            Some(self.event_cache.get_node())
        } else {
            None
        }
    }

    pub fn get_complete_server_snap(&self) -> Option<&Node> {
        if self.server_cache.is_fully_initialized() {
            Some(self.server_cache.get_node())
        } else {
            None
        }
    }
}
