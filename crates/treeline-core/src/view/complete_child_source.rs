//! Where a filter can obtain children it does not have in view.
//!
//! Limited windows sometimes need a sibling from outside the window (a
//! removal pulls the next child in). Depending on the operation being
//! processed the filter may be allowed to consult pending writes and
//! server data, or nothing at all.

use crate::snap::index::Index;
use crate::snap::node::{NamedNode, Node};
use crate::view::cache::{CacheNode, ViewCache};
use crate::write::write_tree::WriteTreeRef;

pub trait CompleteChildSource {
    fn get_complete_child(&self, child_key: &str) -> Option<Node>;

    /// Next sibling after `child` in index order (before it when
    /// `reverse`), drawn from outside the current window.
    fn get_child_after_child(
        &self,
        index: &Index,
        child: &NamedNode,
        reverse: bool,
    ) -> Option<NamedNode>;
}

/// Source for operations that must not look beyond the view itself.
pub struct NoCompleteChildSource;

pub const NO_COMPLETE_CHILD_SOURCE: NoCompleteChildSource = NoCompleteChildSource;

impl CompleteChildSource for NoCompleteChildSource {
    fn get_complete_child(&self, _child_key: &str) -> Option<Node> {
        None
    }

    fn get_child_after_child(
        &self,
        _index: &Index,
        _child: &NamedNode,
        _reverse: bool,
    ) -> Option<NamedNode> {
        None
    }
}

/// Source backed by the pending-write ledger layered over the view's
/// server cache (or an explicitly supplied complete server node).
pub struct WriteTreeCompleteChildSource<'a> {
    writes: &'a WriteTreeRef<'a>,
    view_cache: &'a ViewCache,
    opt_complete_server_cache: Option<&'a Node>,
}

impl<'a> WriteTreeCompleteChildSource<'a> {
    pub fn new(
        writes: &'a WriteTreeRef<'a>,
        view_cache: &'a ViewCache,
        opt_complete_server_cache: Option<&'a Node>,
    ) -> Self {
        WriteTreeCompleteChildSource {
            writes,
            view_cache,
            opt_complete_server_cache,
        }
    }
}

impl CompleteChildSource for WriteTreeCompleteChildSource<'_> {
    fn get_complete_child(&self, child_key: &str) -> Option<Node> {
        let event_cache = self.view_cache.event_cache();
        if event_cache.is_complete_for_child(child_key) {
            return Some(event_cache.get_node().get_immediate_child(child_key));
        }
        let server_node = match self.opt_complete_server_cache {
            Some(server) => CacheNode::new(server.clone(), true, false),
            None => self.view_cache.server_cache().clone(),
        };
        self.writes.calc_complete_child(child_key, &server_node)
    }

    fn get_child_after_child(
        &self,
        index: &Index,
        child: &NamedNode,
        reverse: bool,
    ) -> Option<NamedNode> {
        let complete_server_data = self
            .opt_complete_server_cache
            .or_else(|| self.view_cache.get_complete_server_snap());
        let nodes = self
            .writes
            .calc_indexed_slice(complete_server_data, child, 1, reverse, index);
        nodes.into_iter().next()
    }
}
