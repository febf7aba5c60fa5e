//! Tracks which other queries are touched while loading a response.

use std::collections::BTreeSet;

/// Collects the ids of queries whose cached results reference an entity
/// that the current load is rewriting. The loading query's own id is
/// never recorded; callers report it separately.
#[derive(Debug)]
pub struct ImpactedQueryRefs {
    own_query_id: String,
    impacted: BTreeSet<String>,
}

impl ImpactedQueryRefs {
    pub fn new(own_query_id: impl Into<String>) -> ImpactedQueryRefs {
        ImpactedQueryRefs {
            own_query_id: own_query_id.into(),
            impacted: BTreeSet::new(),
        }
    }

    pub fn record(&mut self, query_id: &str) {
        if query_id != self.own_query_id {
            self.impacted.insert(query_id.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.impacted.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.impacted.into_iter().collect()
    }
}
