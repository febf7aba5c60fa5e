//! The query-level cache: normalizes responses into entity records and
//! result trees held by a [`CacheProvider`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::accumulator::ImpactedQueryRefs;
use crate::entity::{EncodingMode, EntityNode};
use crate::error::Result;
use crate::provider::CacheProvider;
use crate::result_tree::{ResultTree, DEFAULT_TTL_MS};

pub struct QueryCache {
    provider: Arc<dyn CacheProvider>,
    max_age_ms: AtomicU64,
}

impl QueryCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> QueryCache {
        QueryCache {
            provider,
            max_age_ms: AtomicU64::new(DEFAULT_TTL_MS),
        }
    }

    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    /// Lifetime applied to result trees stored from now on. Existing
    /// entries keep the lifetime they were stored with.
    pub fn set_max_age_seconds(&self, seconds: u64) {
        self.max_age_ms.store(seconds * 1_000, Ordering::Relaxed);
    }

    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms.load(Ordering::Relaxed)
    }

    /// Stores a query response, sharing annotated entities across
    /// queries. Returns the ids of every query whose cached result is
    /// affected; the updated query itself comes first.
    pub async fn update(
        &self,
        query_id: &str,
        data: &Value,
        annotations: Option<&Value>,
        now_ms: u64,
    ) -> Result<Vec<String>> {
        let mut root = EntityNode::new();
        let mut accumulator = ImpactedQueryRefs::new(query_id);
        root.load_data(
            query_id,
            data,
            annotations,
            &mut accumulator,
            self.provider.as_ref(),
        )
        .await?;
        let serialized = serde_json::to_string(&root)?;
        let tree = ResultTree::new(root, serialized, self.max_age_ms(), now_ms);
        self.provider.set_result_tree(query_id, tree).await?;
        let mut impacted = vec![query_id.to_string()];
        impacted.extend(accumulator.into_vec());
        debug!(query_id, impacted = impacted.len(), "cached query result");
        Ok(impacted)
    }

    /// Re-registers a result tree from its stored serialization.
    pub async fn update_from_serialized(
        &self,
        query_id: &str,
        serialized: &str,
        now_ms: u64,
    ) -> Result<()> {
        let root: EntityNode = serde_json::from_str(serialized)?;
        let tree = ResultTree::new(root, serialized.to_string(), self.max_age_ms(), now_ms);
        self.provider.set_result_tree(query_id, tree).await
    }

    pub async fn contains_result_tree(&self, query_id: &str) -> Result<bool> {
        self.provider.contains_result_tree(query_id).await
    }

    pub async fn get_result_tree(&self, query_id: &str) -> Result<Option<ResultTree>> {
        self.provider.get_result_tree(query_id).await
    }

    pub async fn set_result_tree(&self, query_id: &str, tree: ResultTree) -> Result<()> {
        self.provider.set_result_tree(query_id, tree).await
    }

    /// Rehydrates the cached result for a query, filling entity fields
    /// from the shared records.
    pub async fn get_result_json(&self, query_id: &str) -> Result<Option<Value>> {
        match self.provider.get_result_tree(query_id).await? {
            Some(tree) => Ok(Some(
                tree.root
                    .to_json(EncodingMode::Hydrated, self.provider.as_ref())
                    .await?,
            )),
            None => Ok(None),
        }
    }
}
