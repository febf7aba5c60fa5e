//! Slash-separated paths into the snapshot tree.
//!
//! A [`Path`] is an immutable sequence of child names. Consuming the
//! front of a path (`pop_front`) only advances an offset into the shared
//! segment vector, so recursive descent does not reallocate.

use std::fmt;
use std::sync::Arc;

use crate::name::name_compare;

#[derive(Clone)]
pub struct Path {
    pieces: Arc<Vec<String>>,
    offset: usize,
}

impl Path {
    /// Parses a `/`-separated path. Empty segments are skipped, so
    /// `"/a//b/"` and `"a/b"` are the same path.
    pub fn new(path: &str) -> Path {
        let pieces: Vec<String> = path
            .split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Path {
            pieces: Arc::new(pieces),
            offset: 0,
        }
    }

    pub fn root() -> Path {
        Path {
            pieces: Arc::new(Vec::new()),
            offset: 0,
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Path {
        debug_assert!(segments.iter().all(|s| !s.is_empty()));
        Path {
            pieces: Arc::new(segments),
            offset: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.pieces.len()
    }

    pub fn len(&self) -> usize {
        self.pieces.len() - self.offset
    }

    /// First segment, or `None` for the root path.
    pub fn front(&self) -> Option<&str> {
        self.pieces.get(self.offset).map(String::as_str)
    }

    pub fn back(&self) -> Option<&str> {
        if self.is_empty() {
            None
        } else {
            Some(self.pieces.last().unwrap().as_str())
        }
    }

    /// Path without its first segment. Popping the root yields the root.
    pub fn pop_front(&self) -> Path {
        let offset = if self.is_empty() {
            self.offset
        } else {
            self.offset + 1
        };
        Path {
            pieces: Arc::clone(&self.pieces),
            offset,
        }
    }

    /// Path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_empty() {
            return None;
        }
        let pieces: Vec<String> = self.segments().take(self.len() - 1).map(str::to_string).collect();
        Some(Path::from_segments(pieces))
    }

    /// This path extended by `other`.
    pub fn child(&self, other: &Path) -> Path {
        let mut pieces: Vec<String> = self.segments().map(str::to_string).collect();
        pieces.extend(other.segments().map(str::to_string));
        Path::from_segments(pieces)
    }

    pub fn child_name(&self, name: &str) -> Path {
        let mut pieces: Vec<String> = self.segments().map(str::to_string).collect();
        pieces.push(name.to_string());
        Path::from_segments(pieces)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.pieces[self.offset..].iter().map(String::as_str)
    }

    /// Whether `other` starts with this path.
    pub fn contains(&self, other: &Path) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.segments().zip(other.segments()).all(|(a, b)| a == b)
    }

    /// Strips `outer` from the front of `inner`.
    ///
    /// # Panics
    /// Panics when `inner` is not at or below `outer`.
    pub fn relative(outer: &Path, inner: &Path) -> Path {
        match Path::try_relative(outer, inner) {
            Some(path) => path,
            None => panic!("{inner} is not contained in {outer}"),
        }
    }

    pub fn try_relative(outer: &Path, inner: &Path) -> Option<Path> {
        if outer.contains(inner) {
            Some(Path {
                pieces: Arc::clone(&inner.pieces),
                offset: inner.offset + outer.len(),
            })
        } else {
            None
        }
    }

    pub fn compare(&self, other: &Path) -> std::cmp::Ordering {
        for (a, b) in self.segments().zip(other.segments()) {
            let cmp = name_compare(a, b);
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        self.len().cmp(&other.len())
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.segments().zip(other.segments()).all(|(a, b)| a == b)
    }
}

impl Eq for Path {}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "/");
        }
        for piece in self.segments() {
            write!(f, "/{piece}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Path {
        Path::new(s)
    }
}
