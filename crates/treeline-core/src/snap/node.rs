//! Immutable snapshot nodes.
//!
//! A [`Node`] is a cheaply clonable handle (one `Arc`) to one of four
//! shapes: the empty node, a scalar leaf, an interior node with named
//! children, or the unnameable maximum sentinel. All mutators return new
//! nodes and share untouched subtrees with their input.
//!
//! Priorities ride along as a node-valued annotation and are addressable
//! through the `.priority` pseudo-child, so path-based updates can set
//! them with no special casing at call sites.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use treeline_ordered_map::OrderedMap;

use crate::name::string_name_compare;
use crate::path::Path;
use crate::snap::index::{Index, IndexPost};
use crate::snap::index_map::IndexMap;

/// Scalar payload of a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    /// Cross-type ordering: booleans sort before numbers, numbers before
    /// strings.
    fn type_rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Number(_) => 1,
            Scalar::String(_) => 2,
        }
    }

    fn compare(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Scalar::String(a), Scalar::String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

/// A child node paired with its name.
#[derive(Clone, Debug)]
pub struct NamedNode {
    pub name: String,
    pub node: Node,
}

impl NamedNode {
    pub fn new(name: &str, node: Node) -> NamedNode {
        NamedNode {
            name: name.to_string(),
            node,
        }
    }

    /// Post below every real child.
    pub fn min() -> NamedNode {
        NamedNode::new(crate::name::MIN_NAME, Node::empty())
    }
}

impl PartialEq for NamedNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.node == other.node
    }
}

pub(crate) enum Repr {
    Empty,
    Leaf {
        value: Scalar,
        priority: Node,
        hash: OnceLock<String>,
    },
    Children {
        children: OrderedMap<String, Node>,
        priority: Node,
        indexes: IndexMap,
        hash: OnceLock<String>,
    },
    /// Sorts after every other node. Never stored in a tree; only used
    /// as an unreachable range endpoint.
    Max,
}

#[derive(Clone)]
pub struct Node {
    pub(crate) repr: Arc<Repr>,
}

fn empty_node() -> &'static Node {
    static EMPTY: OnceLock<Node> = OnceLock::new();
    EMPTY.get_or_init(|| Node {
        repr: Arc::new(Repr::Empty),
    })
}

fn max_node() -> &'static Node {
    static MAX: OnceLock<Node> = OnceLock::new();
    MAX.get_or_init(|| Node {
        repr: Arc::new(Repr::Max),
    })
}

/// Validated in leaf/children constructors: a priority is empty or a
/// string/number leaf without a priority of its own.
pub(crate) fn assert_valid_priority(priority: &Node) {
    match &*priority.repr {
        Repr::Empty => {}
        Repr::Leaf { value, priority, .. } => {
            assert!(
                !matches!(value, Scalar::Bool(_)),
                "priorities must be strings or numbers"
            );
            assert!(priority.is_empty(), "a priority cannot carry a priority");
        }
        Repr::Children { .. } | Repr::Max => {
            panic!("priorities must be strings or numbers")
        }
    }
}

impl Node {
    pub fn empty() -> Node {
        empty_node().clone()
    }

    pub fn max() -> Node {
        max_node().clone()
    }

    pub fn leaf(value: Scalar) -> Node {
        Node::leaf_with_priority(value, Node::empty())
    }

    pub fn leaf_with_priority(value: Scalar, priority: Node) -> Node {
        assert_valid_priority(&priority);
        Node {
            repr: Arc::new(Repr::Leaf {
                value,
                priority,
                hash: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn children_node(
        children: OrderedMap<String, Node>,
        priority: Node,
        indexes: IndexMap,
    ) -> Node {
        if children.is_empty() {
            return Node::empty();
        }
        assert_valid_priority(&priority);
        Node {
            repr: Arc::new(Repr::Children {
                children,
                priority,
                indexes,
                hash: OnceLock::new(),
            }),
        }
    }

    /// Builds an interior node from a plain child map, indexing it by
    /// priority when any child carries one.
    pub fn from_children(children: OrderedMap<String, Node>, priority: Node) -> Node {
        let indexes = IndexMap::for_children(&children);
        Node::children_node(children, priority, indexes)
    }

    pub(crate) fn empty_children_map() -> OrderedMap<String, Node> {
        OrderedMap::with_comparator(string_name_compare)
    }

    /// Leaf standing in for "a node with this priority" in range posts.
    pub(crate) fn priority_post(priority: Node) -> Node {
        Node {
            repr: Arc::new(Repr::Leaf {
                value: Scalar::String("[PRIORITY-POST]".to_string()),
                priority,
                hash: OnceLock::new(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(&*self.repr, Repr::Empty)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(&*self.repr, Repr::Leaf { .. })
    }

    pub(crate) fn is_max(&self) -> bool {
        matches!(&*self.repr, Repr::Max)
    }

    pub fn leaf_value(&self) -> Option<&Scalar> {
        match &*self.repr {
            Repr::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn get_priority(&self) -> Node {
        match &*self.repr {
            Repr::Leaf { priority, .. } | Repr::Children { priority, .. } => priority.clone(),
            Repr::Empty | Repr::Max => Node::empty(),
        }
    }

    pub fn update_priority(&self, priority: &Node) -> Node {
        match &*self.repr {
            Repr::Empty | Repr::Max => self.clone(),
            Repr::Leaf { value, .. } => {
                Node::leaf_with_priority(value.clone(), priority.clone())
            }
            Repr::Children {
                children, indexes, ..
            } => Node::children_node(children.clone(), priority.clone(), indexes.clone()),
        }
    }

    pub fn num_children(&self) -> usize {
        match &*self.repr {
            Repr::Children { children, .. } => children.len(),
            _ => 0,
        }
    }

    pub fn has_children(&self) -> bool {
        self.num_children() > 0
    }

    pub fn has_child(&self, name: &str) -> bool {
        !self.get_immediate_child(name).is_empty()
    }

    pub fn get_immediate_child(&self, name: &str) -> Node {
        if name == ".priority" {
            return self.get_priority();
        }
        match &*self.repr {
            Repr::Children { children, .. } => children
                .get(&name.to_string())
                .cloned()
                .unwrap_or_else(Node::empty),
            _ => Node::empty(),
        }
    }

    pub fn get_child(&self, path: &Path) -> Node {
        match path.front() {
            None => self.clone(),
            Some(front) => self.get_immediate_child(front).get_child(&path.pop_front()),
        }
    }

    pub fn update_immediate_child(&self, name: &str, new_child: &Node) -> Node {
        if name == ".priority" {
            return self.update_priority(new_child);
        }
        match &*self.repr {
            Repr::Empty | Repr::Max => {
                if new_child.is_empty() {
                    self.clone()
                } else {
                    let children =
                        Node::empty_children_map().insert(name.to_string(), new_child.clone());
                    Node::from_children(children, Node::empty())
                }
            }
            Repr::Leaf { priority, .. } => {
                if new_child.is_empty() {
                    self.clone()
                } else {
                    let children =
                        Node::empty_children_map().insert(name.to_string(), new_child.clone());
                    Node::from_children(children, priority.clone())
                }
            }
            Repr::Children {
                children,
                priority,
                indexes,
                ..
            } => {
                let named = NamedNode::new(name, new_child.clone());
                let (new_children, new_indexes) = if new_child.is_empty() {
                    (
                        children.remove(&name.to_string()),
                        indexes.remove_from_indexes(&named, children),
                    )
                } else {
                    (
                        children.insert(name.to_string(), new_child.clone()),
                        indexes.add_to_indexes(&named, children),
                    )
                };
                let new_priority = if new_children.is_empty() {
                    Node::empty()
                } else {
                    priority.clone()
                };
                Node::children_node(new_children, new_priority, new_indexes)
            }
        }
    }

    pub fn update_child(&self, path: &Path, new_child: &Node) -> Node {
        match path.front() {
            None => new_child.clone(),
            Some(front) => {
                assert!(
                    front != ".priority" || path.len() == 1,
                    ".priority must be the last segment of a path"
                );
                let updated = self
                    .get_immediate_child(front)
                    .update_child(&path.pop_front(), new_child);
                self.update_immediate_child(front, &updated)
            }
        }
    }

    // ── Indexed access ──────────────────────────────────────────────

    /// New node guaranteed to answer ordered queries under `index`.
    pub fn with_index(&self, index: &Index) -> Node {
        match &*self.repr {
            Repr::Children {
                children,
                priority,
                indexes,
                ..
            } => {
                if matches!(index, Index::Key) || indexes.has_index(index) {
                    self.clone()
                } else {
                    let new_indexes = indexes.with_index(index, children);
                    Node::children_node(children.clone(), priority.clone(), new_indexes)
                }
            }
            _ => self.clone(),
        }
    }

    pub fn is_indexed(&self, index: &Index) -> bool {
        match &*self.repr {
            Repr::Children { indexes, .. } => {
                matches!(index, Index::Key) || indexes.has_index(index)
            }
            _ => true,
        }
    }

    /// First child under `index`, if any.
    pub fn get_first_child(&self, index: &Index) -> Option<NamedNode> {
        self.iter_children(index).next()
    }

    pub fn get_last_child(&self, index: &Index) -> Option<NamedNode> {
        self.iter_children_reverse(index).next()
    }

    /// Name of the child just before `(name, child)` in index order.
    pub fn get_predecessor_child_name(
        &self,
        name: &str,
        child: &Node,
        index: &Index,
    ) -> Option<String> {
        match &*self.repr {
            Repr::Children {
                children, indexes, ..
            } => match indexes.resolve(index) {
                Some(map) => {
                    let post = IndexPost::new(index, name, child);
                    map.predecessor_key(&post).map(|p| p.name.clone())
                }
                None => children.predecessor_key(&name.to_string()).cloned(),
            },
            _ => None,
        }
    }

    pub fn iter_children(&self, index: &Index) -> ChildIter<'_> {
        self.children_iter(index, None, false)
    }

    pub fn iter_children_reverse(&self, index: &Index) -> ChildIter<'_> {
        self.children_iter(index, None, true)
    }

    /// Iterates children in index order starting at `post` (inclusive).
    pub fn iter_children_from(&self, index: &Index, post: &NamedNode, reverse: bool) -> ChildIter<'_> {
        self.children_iter(index, Some(post), reverse)
    }

    fn children_iter(&self, index: &Index, start: Option<&NamedNode>, reverse: bool) -> ChildIter<'_> {
        let (children, indexes) = match &*self.repr {
            Repr::Children {
                children, indexes, ..
            } => (children, indexes),
            _ => return ChildIter::Empty,
        };
        if !matches!(index, Index::Key) {
            if let Some(map) = indexes.resolve(index) {
                let iter = match (start, reverse) {
                    (None, false) => map.iter(),
                    (None, true) => map.iter_reverse(),
                    (Some(post), false) => {
                        map.iter_from(&IndexPost::new(index, &post.name, &post.node))
                    }
                    (Some(post), true) => {
                        map.iter_reverse_from(&IndexPost::new(index, &post.name, &post.node))
                    }
                };
                return ChildIter::ByIndex(iter);
            }
        }
        // Key order; for an unindexed view this coincides with index
        // order because no child carries an indexed value.
        let iter = match (start, reverse) {
            (None, false) => children.iter(),
            (None, true) => children.iter_reverse(),
            (Some(post), false) => children.iter_from(&post.name),
            (Some(post), true) => children.iter_reverse_from(&post.name),
        };
        let mut iter = ChildIter::ByKey(iter);
        if let Some(post) = start {
            // Children without an indexed value sort before any post that
            // carries one; they are outside the window and get skipped.
            let skip = |next: &NamedNode| {
                let cmp = index.compare(next, post);
                if reverse {
                    cmp == Ordering::Greater
                } else {
                    cmp == Ordering::Less
                }
            };
            while let Some(next) = iter.peek() {
                if skip(&next) {
                    iter.next();
                } else {
                    break;
                }
            }
        }
        iter
    }

    /// Visits children in index order; `f` returning `true` aborts.
    pub fn for_each_child(&self, index: &Index, f: &mut dyn FnMut(&str, &Node) -> bool) -> bool {
        match &*self.repr {
            Repr::Children {
                children, indexes, ..
            } => {
                if !matches!(index, Index::Key) {
                    if let Some(map) = indexes.resolve(index) {
                        return map.inorder_traversal(&mut |post, node| f(&post.name, node));
                    }
                }
                children.inorder_traversal(&mut |name, node| f(name, node))
            }
            _ => false,
        }
    }

    pub(crate) fn children_map(&self) -> Option<&OrderedMap<String, Node>> {
        match &*self.repr {
            Repr::Children { children, .. } => Some(children),
            _ => None,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.repr, &other.repr) {
            return true;
        }
        match (&*self.repr, &*other.repr) {
            (Repr::Empty, Repr::Empty) => true,
            (Repr::Max, Repr::Max) => true,
            (
                Repr::Leaf {
                    value: va,
                    priority: pa,
                    ..
                },
                Repr::Leaf {
                    value: vb,
                    priority: pb,
                    ..
                },
            ) => va == vb && pa == pb,
            (
                Repr::Children {
                    children: ca,
                    priority: pa,
                    ..
                },
                Repr::Children {
                    children: cb,
                    priority: pb,
                    ..
                },
            ) => {
                if pa != pb || ca.len() != cb.len() {
                    return false;
                }
                ca.iter()
                    .zip(cb.iter())
                    .all(|((ka, na), (kb, nb))| ka == kb && na == nb)
            }
            _ => false,
        }
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_max() {
            return write!(f, "Node(MAX)");
        }
        write!(f, "Node({})", self.val_export())
    }
}

/// Total order across node shapes: empty < leaves < interiors < max.
/// Two interior nodes are unordered relative to each other (their
/// children decide nothing here); indexes break such ties by name.
pub fn node_compare(a: &Node, b: &Node) -> Ordering {
    match (&*a.repr, &*b.repr) {
        (Repr::Empty, Repr::Empty) => Ordering::Equal,
        (Repr::Empty, _) => Ordering::Less,
        (_, Repr::Empty) => Ordering::Greater,
        (Repr::Max, Repr::Max) => Ordering::Equal,
        (Repr::Max, _) => Ordering::Greater,
        (_, Repr::Max) => Ordering::Less,
        (Repr::Leaf { value: va, .. }, Repr::Leaf { value: vb, .. }) => va.compare(vb),
        (Repr::Leaf { .. }, Repr::Children { .. }) => Ordering::Less,
        (Repr::Children { .. }, Repr::Leaf { .. }) => Ordering::Greater,
        (Repr::Children { .. }, Repr::Children { .. }) => Ordering::Equal,
    }
}

/// Iterator over an interior node's children in some index order.
pub enum ChildIter<'a> {
    Empty,
    ByKey(treeline_ordered_map::OrderedMapIter<'a, String, Node>),
    ByIndex(treeline_ordered_map::OrderedMapIter<'a, IndexPost, Node>),
}

impl ChildIter<'_> {
    pub fn peek(&self) -> Option<NamedNode> {
        match self {
            ChildIter::Empty => None,
            ChildIter::ByKey(iter) => iter.peek().map(|(k, v)| NamedNode::new(k, v.clone())),
            ChildIter::ByIndex(iter) => {
                iter.peek().map(|(post, v)| NamedNode::new(&post.name, v.clone()))
            }
        }
    }
}

impl Iterator for ChildIter<'_> {
    type Item = NamedNode;

    fn next(&mut self) -> Option<NamedNode> {
        match self {
            ChildIter::Empty => None,
            ChildIter::ByKey(iter) => iter.next().map(|(k, v)| NamedNode::new(k, v.clone())),
            ChildIter::ByIndex(iter) => {
                iter.next().map(|(post, v)| NamedNode::new(&post.name, v.clone()))
            }
        }
    }
}
