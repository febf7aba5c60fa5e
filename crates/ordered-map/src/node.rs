//! Internal tree nodes for [`OrderedMap`](crate::OrderedMap).
//!
//! Nodes are reference-counted and never mutated after construction, so
//! any number of map versions can share subtrees. Every structural change
//! copies the O(log n) spine from the touched node up to the root and
//! leaves everything else aliased.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::Comparator;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Color {
    Red,
    Black,
}

pub(crate) type Link<K, V> = Option<Arc<MapNode<K, V>>>;

#[derive(Debug)]
pub(crate) struct MapNode<K, V> {
    pub key: K,
    pub value: V,
    pub color: Color,
    pub left: Link<K, V>,
    pub right: Link<K, V>,
    /// Number of entries in the subtree rooted here.
    pub count: usize,
}

pub(crate) fn is_red<K, V>(link: &Link<K, V>) -> bool {
    matches!(link, Some(n) if n.color == Color::Red)
}

pub(crate) fn count<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.count)
}

impl<K: Clone, V: Clone> MapNode<K, V> {
    pub fn new(key: K, value: V, color: Color, left: Link<K, V>, right: Link<K, V>) -> Arc<Self> {
        let n = count(&left) + 1 + count(&right);
        Arc::new(MapNode {
            key,
            value,
            color,
            left,
            right,
            count: n,
        })
    }

    /// Copy of this node with some fields replaced.
    fn with(
        &self,
        color: Option<Color>,
        left: Option<Link<K, V>>,
        right: Option<Link<K, V>>,
    ) -> Arc<Self> {
        let left = left.unwrap_or_else(|| self.left.clone());
        let right = right.unwrap_or_else(|| self.right.clone());
        MapNode::new(
            self.key.clone(),
            self.value.clone(),
            color.unwrap_or(self.color),
            left,
            right,
        )
    }

    fn with_entry(&self, key: K, value: V) -> Arc<Self> {
        MapNode::new(key, value, self.color, self.left.clone(), self.right.clone())
    }

    fn rotate_left(&self) -> Arc<Self> {
        let right = self.right.as_ref().expect("rotate_left on node without right child");
        let new_left = self.with(Some(Color::Red), None, Some(right.left.clone()));
        right.with(Some(self.color), Some(Some(new_left)), None)
    }

    fn rotate_right(&self) -> Arc<Self> {
        let left = self.left.as_ref().expect("rotate_right on node without left child");
        let new_right = self.with(Some(Color::Red), Some(left.right.clone()), None);
        left.with(Some(self.color), None, Some(Some(new_right)))
    }

    fn color_flip(&self) -> Arc<Self> {
        let flip = |link: &Link<K, V>| -> Link<K, V> {
            link.as_ref().map(|n| n.with(Some(n.color.flip()), None, None))
        };
        let left = flip(&self.left);
        let right = flip(&self.right);
        self.with(Some(self.color.flip()), Some(left), Some(right))
    }

    /// Restores the left-leaning invariants after a child changed.
    fn fix_up(self: Arc<Self>) -> Arc<Self> {
        let mut n = self;
        if is_red(&n.right) && !is_red(&n.left) {
            n = n.rotate_left();
        }
        if is_red(&n.left) && is_red(&n.left.as_ref().unwrap().left) {
            n = n.rotate_right();
        }
        if is_red(&n.left) && is_red(&n.right) {
            n = n.color_flip();
        }
        n
    }

    fn move_red_left(self: Arc<Self>) -> Arc<Self> {
        let mut n = self.color_flip();
        if n.right.as_ref().map_or(false, |r| is_red(&r.left)) {
            let rotated_right = n.right.as_ref().unwrap().rotate_right();
            n = n.with(None, None, Some(Some(rotated_right)));
            n = n.rotate_left();
            n = n.color_flip();
        }
        n
    }

    fn move_red_right(self: Arc<Self>) -> Arc<Self> {
        let mut n = self.color_flip();
        if n.left.as_ref().map_or(false, |l| is_red(&l.left)) {
            n = n.rotate_right();
            n = n.color_flip();
        }
        n
    }

    /// Roots are always black.
    pub(crate) fn blacken(self: Arc<Self>) -> Arc<Self> {
        if self.color == Color::Black {
            self
        } else {
            self.with(Some(Color::Black), None, None)
        }
    }

    fn min_node(self: &Arc<Self>) -> &Arc<Self> {
        match &self.left {
            Some(left) => left.min_node(),
            None => self,
        }
    }

    fn remove_min(self: &Arc<Self>) -> Link<K, V> {
        if self.left.is_none() {
            return None;
        }
        let mut n = self.clone();
        if !is_red(&n.left) && !is_red(&n.left.as_ref().unwrap().left) {
            n = n.move_red_left();
        }
        let new_left = n.left.as_ref().unwrap().remove_min();
        n = n.with(None, Some(new_left), None);
        Some(n.fix_up())
    }
}

impl Color {
    fn flip(self) -> Color {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}

pub(crate) fn insert<K: Clone, V: Clone>(
    link: &Link<K, V>,
    key: K,
    value: V,
    cmp: Comparator<K>,
) -> Arc<MapNode<K, V>> {
    let node = match link {
        None => return MapNode::new(key, value, Color::Red, None, None),
        Some(node) => node,
    };
    let n = match cmp(&key, &node.key) {
        Ordering::Equal => node.with_entry(key, value),
        Ordering::Less => {
            let new_left = insert(&node.left, key, value, cmp);
            node.with(None, Some(Some(new_left)), None)
        }
        Ordering::Greater => {
            let new_right = insert(&node.right, key, value, cmp);
            node.with(None, None, Some(Some(new_right)))
        }
    };
    n.fix_up()
}

pub(crate) fn remove<K: Clone, V: Clone>(
    node: &Arc<MapNode<K, V>>,
    key: &K,
    cmp: Comparator<K>,
) -> Link<K, V> {
    let mut n = node.clone();
    if cmp(key, &n.key) == Ordering::Less {
        if n.left.is_some() && !is_red(&n.left) && !is_red(&n.left.as_ref().unwrap().left) {
            n = n.move_red_left();
        }
        let new_left = match &n.left {
            Some(left) => remove(left, key, cmp),
            None => None,
        };
        n = n.with(None, Some(new_left), None);
    } else {
        if is_red(&n.left) {
            n = n.rotate_right();
        }
        if n.right.is_some() && !is_red(&n.right) && !is_red(&n.right.as_ref().unwrap().left) {
            n = n.move_red_right();
        }
        if cmp(key, &n.key) == Ordering::Equal {
            match &n.right {
                None => return None,
                Some(right) => {
                    let smallest = right.min_node();
                    let new_right = right.remove_min();
                    n = MapNode::new(
                        smallest.key.clone(),
                        smallest.value.clone(),
                        n.color,
                        n.left.clone(),
                        new_right,
                    );
                }
            }
        }
        let new_right = match &n.right {
            Some(right) => remove(right, key, cmp),
            None => None,
        };
        n = n.with(None, None, Some(new_right));
    }
    Some(n.fix_up())
}
