//! Persistent tree keyed by paths, with at most one value per node.
//!
//! Used to organize pending writes by location: the value at a node
//! applies to that whole subtree, and lookups often want the rootmost
//! value on the way to a path (a write at `/a` shadows anything under
//! `/a/b`).

use treeline_ordered_map::OrderedMap;

use crate::path::Path;

#[derive(Clone)]
pub struct ImmutableTree<T> {
    value: Option<T>,
    children: OrderedMap<String, ImmutableTree<T>>,
}

impl<T: Clone> Default for ImmutableTree<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone> ImmutableTree<T> {
    pub fn empty() -> Self {
        ImmutableTree {
            value: None,
            children: OrderedMap::new(),
        }
    }

    pub fn leaf(value: T) -> Self {
        ImmutableTree {
            value: Some(value),
            children: OrderedMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Shallowest value at or above `path` that satisfies `pred`,
    /// together with its location.
    pub fn find_root_most_matching(
        &self,
        path: &Path,
        pred: &dyn Fn(&T) -> bool,
    ) -> Option<(Path, &T)> {
        if let Some(value) = &self.value {
            if pred(value) {
                return Some((Path::root(), value));
            }
        }
        let front = path.front()?;
        let child = self.children.get(&front.to_string())?;
        let (child_path, value) = child.find_root_most_matching(&path.pop_front(), pred)?;
        Some((Path::new(front).child(&child_path), value))
    }

    /// Shallowest value at or above `path`.
    pub fn find_root_most(&self, path: &Path) -> Option<(Path, &T)> {
        self.find_root_most_matching(path, &|_| true)
    }

    pub fn get(&self, path: &Path) -> Option<&T> {
        match path.front() {
            None => self.value.as_ref(),
            Some(front) => self
                .children
                .get(&front.to_string())?
                .get(&path.pop_front()),
        }
    }

    pub fn subtree(&self, path: &Path) -> ImmutableTree<T> {
        match path.front() {
            None => self.clone(),
            Some(front) => match self.children.get(&front.to_string()) {
                Some(child) => child.subtree(&path.pop_front()),
                None => ImmutableTree::empty(),
            },
        }
    }

    #[must_use]
    pub fn set(&self, path: &Path, value: T) -> ImmutableTree<T> {
        match path.front() {
            None => ImmutableTree {
                value: Some(value),
                children: self.children.clone(),
            },
            Some(front) => {
                let child = self
                    .children
                    .get(&front.to_string())
                    .cloned()
                    .unwrap_or_else(ImmutableTree::empty);
                let new_child = child.set(&path.pop_front(), value);
                ImmutableTree {
                    value: self.value.clone(),
                    children: self.children.insert(front.to_string(), new_child),
                }
            }
        }
    }

    #[must_use]
    pub fn remove(&self, path: &Path) -> ImmutableTree<T> {
        match path.front() {
            None => {
                if self.children.is_empty() {
                    ImmutableTree::empty()
                } else {
                    ImmutableTree {
                        value: None,
                        children: self.children.clone(),
                    }
                }
            }
            Some(front) => match self.children.get(&front.to_string()) {
                None => self.clone(),
                Some(child) => {
                    let new_child = child.remove(&path.pop_front());
                    let children = if new_child.is_empty() {
                        self.children.remove(&front.to_string())
                    } else {
                        self.children.insert(front.to_string(), new_child)
                    };
                    if self.value.is_none() && children.is_empty() {
                        ImmutableTree::empty()
                    } else {
                        ImmutableTree {
                            value: self.value.clone(),
                            children,
                        }
                    }
                }
            },
        }
    }

    /// Replaces the whole subtree at `path`.
    #[must_use]
    pub fn set_tree(&self, path: &Path, tree: ImmutableTree<T>) -> ImmutableTree<T> {
        match path.front() {
            None => tree,
            Some(front) => {
                let child = self
                    .children
                    .get(&front.to_string())
                    .cloned()
                    .unwrap_or_else(ImmutableTree::empty);
                let new_child = child.set_tree(&path.pop_front(), tree);
                let children = if new_child.is_empty() {
                    self.children.remove(&front.to_string())
                } else {
                    self.children.insert(front.to_string(), new_child)
                };
                ImmutableTree {
                    value: self.value.clone(),
                    children,
                }
            }
        }
    }

    /// Visits every value, children before the node's own value, with
    /// paths relative to this tree.
    pub fn foreach(&self, f: &mut dyn FnMut(&Path, &T)) {
        self.foreach_inner(&Path::root(), f);
    }

    fn foreach_inner(&self, prefix: &Path, f: &mut dyn FnMut(&Path, &T)) {
        self.children.inorder_traversal(&mut |name, child: &ImmutableTree<T>| {
            child.foreach_inner(&prefix.child_name(name), f);
            false
        });
        if let Some(value) = &self.value {
            f(prefix, value);
        }
    }

    pub fn foreach_child(&self, f: &mut dyn FnMut(&str, &ImmutableTree<T>)) {
        self.children.inorder_traversal(&mut |name, child: &ImmutableTree<T>| {
            f(name, child);
            false
        });
    }
}
