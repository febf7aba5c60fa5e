//! Node filters: the strategies that keep a view's cache shaped like
//! its query.

pub mod indexed;
pub mod limited;
pub mod ranged;

use crate::path::Path;
use crate::snap::index::Index;
use crate::snap::node::Node;
use crate::view::change::ChildChangeAccumulator;
use crate::view::complete_child_source::CompleteChildSource;
use crate::view::query_params::QueryParams;

pub use indexed::IndexedFilter;
pub use limited::LimitedFilter;
pub use ranged::RangedFilter;

/// Applies updates to a filtered node while tracking the child changes
/// the update implies. Implementations must produce nodes indexed by
/// their index.
pub trait NodeFilter {
    /// New filtered node after `key` changes to `new_child` (empty to
    /// remove). `affected_path` is where inside the child the change
    /// happened; `source` supplies out-of-window children when the
    /// filter needs a replacement.
    fn update_child(
        &self,
        snap: &Node,
        key: &str,
        new_child: &Node,
        affected_path: &Path,
        source: &dyn CompleteChildSource,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node;

    /// New filtered node for a complete replacement of the node.
    fn update_full_node(
        &self,
        old_snap: &Node,
        new_snap: &Node,
        accumulator: Option<&mut ChildChangeAccumulator>,
    ) -> Node;

    /// New filtered node after a priority change.
    fn update_priority(&self, old_snap: &Node, new_priority: &Node) -> Node;

    /// Whether this filter can drop children.
    fn filters_nodes(&self) -> bool;

    /// The windowless filter with the same index, for updates that must
    /// bypass the window.
    fn indexed_filter(&self) -> &IndexedFilter;

    fn index(&self) -> &Index;
}

/// Filter matching `params`: windowless when the query loads all data,
/// limit-aware when a limit is set, plain ranged otherwise.
pub fn filter_for_params(params: &QueryParams) -> Box<dyn NodeFilter + Send + Sync> {
    if params.loads_all_data() {
        Box::new(IndexedFilter::new(params.get_index().clone()))
    } else if params.has_limit() {
        Box::new(LimitedFilter::new(params))
    } else {
        Box::new(RangedFilter::new(params))
    }
}
