//! Declarative description of a query window.
//!
//! A query orders a location by an index and optionally narrows it with
//! range endpoints and a count limit anchored to one end. Parameters
//! are value types; the builder methods return updated copies.

use serde_json::{json, Map, Value};

use crate::name::{MAX_NAME, MIN_NAME};
use crate::snap::index::Index;
use crate::snap::node::NamedNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ViewFrom {
    /// Anchored to the start of the window.
    Left,
    /// Anchored to the end of the window.
    Right,
}

#[derive(Clone, Debug)]
pub struct QueryParams {
    index: Index,
    start: Option<(Value, Option<String>)>,
    end: Option<(Value, Option<String>)>,
    limit: Option<usize>,
    view_from: Option<ViewFrom>,
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams {
            index: Index::Priority,
            start: None,
            end: None,
            limit: None,
            view_from: None,
        }
    }
}

impl QueryParams {
    pub fn get_index(&self) -> &Index {
        &self.index
    }

    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    pub fn has_end(&self) -> bool {
        self.end.is_some()
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }

    /// Whether a limit is explicitly anchored to one end of the window.
    pub fn has_anchored_limit(&self) -> bool {
        self.limit.is_some() && self.view_from.is_some()
    }

    pub fn get_limit(&self) -> usize {
        self.limit.expect("no limit set")
    }

    /// Whether the query covers the complete node with no windowing.
    pub fn loads_all_data(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.limit.is_none()
    }

    /// Whether this is the unfiltered default query.
    pub fn is_default(&self) -> bool {
        self.loads_all_data() && self.index == Index::Priority
    }

    /// A limit without an explicit anchor attaches to the start when a
    /// start bound exists.
    pub fn is_view_from_left(&self) -> bool {
        match self.view_from {
            Some(ViewFrom::Left) => true,
            Some(ViewFrom::Right) => false,
            None => self.start.is_some(),
        }
    }

    // ── Builders ────────────────────────────────────────────────────

    #[must_use]
    pub fn order_by(mut self, index: Index) -> QueryParams {
        self.index = index;
        self
    }

    #[must_use]
    pub fn start_at(mut self, value: Value, name: Option<&str>) -> QueryParams {
        self.start = Some((value, name.map(str::to_string)));
        self
    }

    #[must_use]
    pub fn end_at(mut self, value: Value, name: Option<&str>) -> QueryParams {
        self.end = Some((value, name.map(str::to_string)));
        self
    }

    #[must_use]
    pub fn limit_to_first(mut self, limit: usize) -> QueryParams {
        assert!(limit > 0, "limit must be positive");
        self.limit = Some(limit);
        self.view_from = Some(ViewFrom::Left);
        self
    }

    #[must_use]
    pub fn limit_to_last(mut self, limit: usize) -> QueryParams {
        assert!(limit > 0, "limit must be positive");
        self.limit = Some(limit);
        self.view_from = Some(ViewFrom::Right);
        self
    }

    // ── Window endpoints ────────────────────────────────────────────

    /// Post bounding the window from below.
    pub fn get_start_post(&self) -> NamedNode {
        match &self.start {
            Some((value, name)) => {
                let name = name.as_deref().unwrap_or(MIN_NAME);
                self.index.make_post(value, name)
            }
            None => self.index.min_post(),
        }
    }

    /// Post bounding the window from above.
    pub fn get_end_post(&self) -> NamedNode {
        match &self.end {
            Some((value, name)) => {
                let name = name.as_deref().unwrap_or(MAX_NAME);
                self.index.make_post(value, name)
            }
            None => self.index.max_post(),
        }
    }

    /// Canonical JSON form, usable as a query identity key.
    pub fn query_object(&self) -> Value {
        let mut obj = Map::new();
        if let Some((value, name)) = &self.start {
            obj.insert("sp".to_string(), value.clone());
            if let Some(name) = name {
                obj.insert("sn".to_string(), json!(name));
            }
        }
        if let Some((value, name)) = &self.end {
            obj.insert("ep".to_string(), value.clone());
            if let Some(name) = name {
                obj.insert("en".to_string(), json!(name));
            }
        }
        if let Some(limit) = self.limit {
            obj.insert("l".to_string(), json!(limit));
            let view_from = if self.is_view_from_left() { "l" } else { "r" };
            obj.insert("vf".to_string(), json!(view_from));
        }
        if self.index != Index::Priority {
            obj.insert("i".to_string(), json!(self.index.query_string()));
        }
        Value::Object(obj)
    }

    pub fn query_identifier(&self) -> String {
        if self.is_default() {
            "default".to_string()
        } else {
            self.query_object().to_string()
        }
    }
}
