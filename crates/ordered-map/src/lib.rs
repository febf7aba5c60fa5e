//! Persistent ordered map backed by a left-leaning red-black tree.
//!
//! Every mutating operation returns a **new** map value and leaves the
//! receiver untouched. Unchanged subtrees are shared between versions
//! through reference counting, so an insert or removal allocates only
//! the O(log n) path from the root to the touched entry.
//!
//! The ordering is supplied as a plain comparator function at
//! construction time rather than through an `Ord` bound, because callers
//! need maps over `String` keys with a domain ordering (child names that
//! look like integers sort numerically before everything else) alongside
//! maps that use the natural ordering.

use std::cmp::Ordering;

mod iter;
mod node;

pub use iter::OrderedMapIter;

use node::{count, Link};

/// Key ordering used by a map instance. A plain `fn` pointer keeps map
/// values `Copy`-cheap to clone and trivially `Send + Sync`.
pub type Comparator<K> = fn(&K, &K) -> Ordering;

fn natural_order<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

/// Immutable ordered map. Cloning is O(1).
pub struct OrderedMap<K, V> {
    root: Link<K, V>,
    cmp: Comparator<K>,
}

impl<K, V> Clone for OrderedMap<K, V> {
    fn clone(&self) -> Self {
        OrderedMap {
            root: self.root.clone(),
            cmp: self.cmp,
        }
    }
}

impl<K: Ord + Clone, V: Clone> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> OrderedMap<K, V> {
    /// Empty map ordered by `K`'s natural ordering.
    pub fn new() -> Self
    where
        K: Ord,
    {
        OrderedMap {
            root: None,
            cmp: natural_order::<K>,
        }
    }

    /// Empty map ordered by `cmp`.
    pub fn with_comparator(cmp: Comparator<K>) -> Self {
        OrderedMap { root: None, cmp }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        count(&self.root)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match (self.cmp)(key, &n.key) {
                Ordering::Equal => return Some(&n.value),
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
            }
        }
        None
    }

    /// New map with `key` bound to `value`, replacing any existing entry.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let inserted = node::insert(&self.root, key, value, self.cmp);
        let root = Some(inserted.blacken());
        OrderedMap { root, cmp: self.cmp }
    }

    /// New map without `key`. Removing an absent key yields an
    /// equivalent map.
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        let root = match &self.root {
            None => None,
            Some(node) => node::remove(node, key, self.cmp).map(|n| n.blacken()),
        };
        OrderedMap { root, cmp: self.cmp }
    }

    pub fn min_key(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some(&node.key)
    }

    pub fn max_key(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Some(&node.key)
    }

    /// Largest key strictly before `key` in the map's ordering, or
    /// `None` when `key` is the smallest. `key` must be present.
    pub fn predecessor_key(&self, key: &K) -> Option<&K> {
        let mut node = self.root.as_deref();
        let mut right_ancestor: Option<&node::MapNode<K, V>> = None;
        while let Some(n) = node {
            match (self.cmp)(key, &n.key) {
                Ordering::Equal => {
                    return match n.left.as_deref() {
                        Some(mut left) => {
                            while let Some(right) = left.right.as_deref() {
                                left = right;
                            }
                            Some(&left.key)
                        }
                        None => right_ancestor.map(|a| &a.key),
                    };
                }
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => {
                    right_ancestor = Some(n);
                    node = n.right.as_deref();
                }
            }
        }
        None
    }

    /// In-order traversal with early exit. `f` returning `true` aborts
    /// the walk; the return value reports whether the walk was aborted.
    pub fn inorder_traversal(&self, f: &mut dyn FnMut(&K, &V) -> bool) -> bool {
        fn walk<K, V>(link: &Link<K, V>, f: &mut dyn FnMut(&K, &V) -> bool) -> bool {
            match link.as_deref() {
                None => false,
                Some(n) => {
                    walk(&n.left, f) || f(&n.key, &n.value) || walk(&n.right, f)
                }
            }
        }
        walk(&self.root, f)
    }

    pub fn iter(&self) -> OrderedMapIter<'_, K, V> {
        OrderedMapIter::new(&self.root, None, self.cmp, false)
    }

    pub fn iter_reverse(&self) -> OrderedMapIter<'_, K, V> {
        OrderedMapIter::new(&self.root, None, self.cmp, true)
    }

    /// Forward iterator starting at the first key `>= start`.
    pub fn iter_from(&self, start: &K) -> OrderedMapIter<'_, K, V> {
        OrderedMapIter::new(&self.root, Some(start), self.cmp, false)
    }

    /// Reverse iterator starting at the last key `<= start`.
    pub fn iter_reverse_from(&self, start: &K) -> OrderedMapIter<'_, K, V> {
        OrderedMapIter::new(&self.root, Some(start), self.cmp, true)
    }
}

impl<'a, K: Clone, V: Clone> IntoIterator for &'a OrderedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = OrderedMapIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> std::fmt::Debug for OrderedMap<K, V>
where
    K: Clone + std::fmt::Debug,
    V: Clone + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
