//! Orderings a children node can be viewed under.
//!
//! An [`Index`] extracts the value a child sorts by. The priority index
//! is the default wire ordering; key, value and arbitrary-subpath
//! indexes back `order_by` queries. Range endpoints are expressed as
//! "posts": [`NamedNode`]s whose extracted value and name bound the
//! window from below or above.

use std::cmp::Ordering;

use crate::name::{name_compare, MAX_NAME, MIN_NAME};
use crate::path::Path;
use crate::snap::node::{node_compare, NamedNode, Node};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Index {
    /// Orders by child name alone.
    Key,
    /// Orders by the child's priority, then name.
    Priority,
    /// Orders by the child node itself, then name.
    Value,
    /// Orders by the node at a relative path inside each child.
    SubPath(Path),
}

impl Index {
    /// Stable string form, used as the key in per-node index maps and in
    /// serialized query parameters.
    pub fn query_string(&self) -> String {
        match self {
            Index::Key => ".key".to_string(),
            Index::Priority => ".priority".to_string(),
            Index::Value => ".value".to_string(),
            Index::SubPath(path) => path.segments().collect::<Vec<_>>().join("/"),
        }
    }

    /// The value `node` sorts by under this index.
    pub fn extract(&self, node: &Node) -> Node {
        match self {
            Index::Key => unreachable!("key index has no extracted value"),
            Index::Priority => node.get_priority(),
            Index::Value => node.clone(),
            Index::SubPath(path) => node.get_child(path),
        }
    }

    /// Whether `node` carries a value under this index. Children without
    /// one sort into the unindexed fallback region.
    pub fn is_defined_on(&self, node: &Node) -> bool {
        match self {
            Index::Key => true,
            Index::Value => true,
            Index::Priority => !node.get_priority().is_empty(),
            Index::SubPath(path) => !node.get_child(path).is_empty(),
        }
    }

    pub fn compare(&self, a: &NamedNode, b: &NamedNode) -> Ordering {
        if let Index::Key = self {
            return name_compare(&a.name, &b.name);
        }
        let cmp = node_compare(&self.extract(&a.node), &self.extract(&b.node));
        if cmp == Ordering::Equal {
            name_compare(&a.name, &b.name)
        } else {
            cmp
        }
    }

    /// Whether a child moving from `old` to `new` changes its sort
    /// position value.
    pub fn indexed_value_changed(&self, old: &Node, new: &Node) -> bool {
        let a = NamedNode::new(MIN_NAME, old.clone());
        let b = NamedNode::new(MIN_NAME, new.clone());
        self.compare(&a, &b) != Ordering::Equal
    }

    /// Builds the post a range endpoint `(value, name)` stands for.
    pub fn make_post(&self, value: &serde_json::Value, name: &str) -> NamedNode {
        match self {
            Index::Key => {
                let key = value.as_str().expect("key index values are child names");
                NamedNode::new(key, Node::empty())
            }
            Index::Priority => {
                let priority = crate::snap::from_json::node_from_json(value)
                    .expect("range endpoint priorities are scalars");
                NamedNode::new(name, Node::priority_post(priority))
            }
            Index::Value => {
                let node = crate::snap::from_json::node_from_json(value)
                    .expect("range endpoint values are valid nodes");
                NamedNode::new(name, node)
            }
            Index::SubPath(path) => {
                let node = crate::snap::from_json::node_from_json(value)
                    .expect("range endpoint values are valid nodes");
                NamedNode::new(name, Node::empty().update_child(path, &node))
            }
        }
    }

    /// Post that sorts before every real child.
    pub fn min_post(&self) -> NamedNode {
        NamedNode::min()
    }

    /// Post that sorts after every real child.
    pub fn max_post(&self) -> NamedNode {
        match self {
            Index::Key => NamedNode::new(MAX_NAME, Node::empty()),
            Index::Priority => NamedNode::new(MAX_NAME, Node::priority_post(Node::max())),
            Index::Value => NamedNode::new(MAX_NAME, Node::max()),
            Index::SubPath(path) => {
                NamedNode::new(MAX_NAME, Node::empty().update_child(path, &Node::max()))
            }
        }
    }
}

/// A child keyed by its extracted index value. The derived map over
/// these posts is what turns "iterate in index order" into plain ordered
/// map traversal.
#[derive(Clone, Debug)]
pub struct IndexPost {
    pub value: Node,
    pub name: String,
}

impl IndexPost {
    pub fn new(index: &Index, name: &str, child: &Node) -> IndexPost {
        IndexPost {
            value: index.extract(child),
            name: name.to_string(),
        }
    }
}

impl PartialEq for IndexPost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexPost {}

impl PartialOrd for IndexPost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexPost {
    fn cmp(&self, other: &Self) -> Ordering {
        node_compare(&self.value, &other.value).then_with(|| name_compare(&self.name, &other.name))
    }
}
