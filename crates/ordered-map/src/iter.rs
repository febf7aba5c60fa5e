//! In-order iteration over map snapshots.

use std::cmp::Ordering;

use crate::node::{Link, MapNode};
use crate::Comparator;

/// Stack-based in-order iterator. Supports reverse traversal and an
/// optional inclusive start bound, mirroring the traversal options of
/// the map itself.
pub struct OrderedMapIter<'a, K, V> {
    stack: Vec<&'a MapNode<K, V>>,
    reverse: bool,
}

impl<'a, K, V> OrderedMapIter<'a, K, V> {
    pub(crate) fn new(
        root: &'a Link<K, V>,
        start: Option<&K>,
        cmp: Comparator<K>,
        reverse: bool,
    ) -> Self {
        let mut stack = Vec::new();
        let mut node = root.as_ref().map(|n| n.as_ref());
        while let Some(n) = node {
            let ord = match start {
                Some(start_key) => {
                    let c = cmp(start_key, &n.key);
                    if reverse {
                        c.reverse()
                    } else {
                        c
                    }
                }
                None => Ordering::Less,
            };
            match ord {
                Ordering::Less => {
                    stack.push(n);
                    node = if reverse {
                        n.right.as_deref()
                    } else {
                        n.left.as_deref()
                    };
                }
                Ordering::Equal => {
                    stack.push(n);
                    break;
                }
                Ordering::Greater => {
                    node = if reverse {
                        n.left.as_deref()
                    } else {
                        n.right.as_deref()
                    };
                }
            }
        }
        OrderedMapIter { stack, reverse }
    }

    /// Next entry without consuming it.
    pub fn peek(&self) -> Option<(&'a K, &'a V)> {
        self.stack.last().map(|n| (&n.key, &n.value))
    }
}

impl<'a, K, V> Iterator for OrderedMapIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let result = (&node.key, &node.value);
        let mut descend = if self.reverse {
            node.left.as_deref()
        } else {
            node.right.as_deref()
        };
        while let Some(n) = descend {
            self.stack.push(n);
            descend = if self.reverse {
                n.right.as_deref()
            } else {
                n.left.as_deref()
            };
        }
        Some(result)
    }
}
