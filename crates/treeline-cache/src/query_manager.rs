//! Orchestrates query execution: cache-first reads, transparent server
//! fallback, mutation write queueing, and subscriber notification.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::QueryCache;
use crate::error::{CacheError, Result};
use crate::transport::{max_age_from_extensions, parse_entity_ids, QueryResponse, Transport};

/// Identity of a query: its operation name plus the variables it was
/// invoked with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryKey {
    pub name: String,
    pub variables: Value,
}

impl QueryKey {
    pub fn new(name: impl Into<String>, variables: Value) -> QueryKey {
        QueryKey {
            name: name.into(),
            variables,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    Query,
    Mutation,
}

/// A named operation handed to the manager for execution.
#[derive(Clone, Debug)]
pub struct QueryRef {
    pub key: QueryKey,
    pub kind: RefKind,
}

impl QueryRef {
    pub fn query(name: impl Into<String>, variables: Value) -> QueryRef {
        QueryRef {
            key: QueryKey::new(name, variables),
            kind: RefKind::Query,
        }
    }

    pub fn mutation(name: impl Into<String>, variables: Value) -> QueryRef {
        QueryRef {
            key: QueryKey::new(name, variables),
            kind: RefKind::Mutation,
        }
    }
}

/// Maps query identities to the string ids used as cache keys.
pub trait QueryKeyCodec: Send + Sync {
    fn encode(&self, key: &QueryKey) -> String;

    fn decode(&self, encoded: &str) -> Result<QueryKey>;
}

/// Default codec: the key's JSON serialization.
pub struct JsonQueryKeyCodec;

impl QueryKeyCodec for JsonQueryKeyCodec {
    fn encode(&self, key: &QueryKey) -> String {
        json!({ "name": key.name, "variables": key.variables }).to_string()
    }

    fn decode(&self, encoded: &str) -> Result<QueryKey> {
        Ok(serde_json::from_str(encoded)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Server,
    Cache,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve from the cache when a fresh result tree exists; otherwise
    /// go to the server transparently.
    #[default]
    PreferCache,
    ServerOnly,
}

/// What a query execution produced, and where it came from.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub data: Value,
    pub source: DataSource,
    /// Milliseconds since the Unix epoch, as a string.
    pub fetch_time: String,
    pub ref_info: QueryKey,
}

impl QueryResult {
    /// Stable string form suitable for handing a result to another
    /// process or session.
    pub fn to_serialized(&self, connector: &str) -> Result<String> {
        let out = json!({
            "data": self.data,
            "source": self.source,
            "fetchTime": self.fetch_time,
            "refInfo": {
                "name": self.ref_info.name,
                "variables": self.ref_info.variables,
                "connector": connector,
            },
        });
        Ok(out.to_string())
    }
}

#[derive(Deserialize)]
struct SerializedRefInfo {
    name: String,
    variables: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedQueryResult {
    data: Value,
    #[serde(rename = "refInfo")]
    ref_info: SerializedRefInfo,
}

type NextCallback = Arc<dyn Fn(&QueryResult) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&CacheError) + Send + Sync>;

struct Subscription {
    id: u64,
    on_next: NextCallback,
    on_error: Option<ErrorCallback>,
}

struct PendingUpdate {
    encoded_key: String,
    response: QueryResponse,
}

/// Front door for executing operations against a connector.
///
/// Reads prefer the cache when a [`QueryCache`] is configured; writes
/// are queued and folded into the cache before the next read so a
/// session always observes its own mutations.
pub struct QueryManager {
    transport: Arc<dyn Transport>,
    cache: Option<QueryCache>,
    codec: Box<dyn QueryKeyCodec>,
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
    last_results: Mutex<HashMap<String, QueryResult>>,
    write_queue: Mutex<VecDeque<PendingUpdate>>,
    next_subscription_id: AtomicU64,
}

impl QueryManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Option<QueryCache>,
        codec: Box<dyn QueryKeyCodec>,
    ) -> QueryManager {
        QueryManager {
            transport,
            cache,
            codec,
            subscriptions: Mutex::new(HashMap::new()),
            last_results: Mutex::new(HashMap::new()),
            write_queue: Mutex::new(VecDeque::new()),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Registers callbacks for a query's results. If a result is
    /// already known it is delivered immediately.
    pub async fn subscribe(
        &self,
        query: &QueryRef,
        on_next: NextCallback,
        on_error: Option<ErrorCallback>,
    ) -> u64 {
        let encoded = self.codec.encode(&query.key);
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        if let Some(result) = self.last_results.lock().await.get(&encoded) {
            on_next(result);
        }
        self.subscriptions
            .lock()
            .await
            .entry(encoded)
            .or_default()
            .push(Subscription {
                id,
                on_next,
                on_error,
            });
        id
    }

    pub async fn unsubscribe(&self, query: &QueryRef, subscription_id: u64) {
        let encoded = self.codec.encode(&query.key);
        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(list) = subscriptions.get_mut(&encoded) {
            list.retain(|s| s.id != subscription_id);
            if list.is_empty() {
                subscriptions.remove(&encoded);
            }
        }
    }

    /// Executes a query, honoring the fetch policy. Cache hits require
    /// a stored result tree that has not passed its lifetime; anything
    /// else falls through to the server without surfacing the miss.
    pub async fn execute_query(
        &self,
        query: &QueryRef,
        policy: FetchPolicy,
    ) -> Result<QueryResult> {
        if query.kind != RefKind::Query {
            return Err(CacheError::invalid_argument(
                "only query refs can be executed as queries",
            ));
        }
        self.wait_for_queued_writes().await?;
        let encoded = self.codec.encode(&query.key);
        let now = now_ms();

        let cache = match &self.cache {
            Some(cache) => cache,
            // Without a result-tree cache the best we can do is replay
            // the last published result.
            None => {
                if policy == FetchPolicy::PreferCache {
                    if let Some(result) = self.last_results.lock().await.get(&encoded) {
                        return Ok(result.clone());
                    }
                }
                return self.fetch_from_server(query, &encoded, now).await;
            }
        };

        if policy == FetchPolicy::ServerOnly {
            return self.fetch_from_server(query, &encoded, now).await;
        }

        match cache.get_result_tree(&encoded).await? {
            Some(mut tree) if !tree.is_stale(now) => {
                tree.update_accessed(now);
                let cached_at = tree.cached_at;
                let root = tree.root.clone();
                cache.set_result_tree(&encoded, tree).await?;
                let data = root
                    .to_json(
                        crate::entity::EncodingMode::Hydrated,
                        cache.provider().as_ref(),
                    )
                    .await?;
                debug!(query = %query.key.name, "serving query from cache");
                let result = QueryResult {
                    data,
                    source: DataSource::Cache,
                    fetch_time: cached_at.to_string(),
                    ref_info: query.key.clone(),
                };
                self.last_results
                    .lock()
                    .await
                    .insert(encoded, result.clone());
                Ok(result)
            }
            _ => {
                debug!(query = %query.key.name, "cache miss, falling back to server");
                self.fetch_from_server(query, &encoded, now).await
            }
        }
    }

    /// Executes a mutation. The response is queued and folded into the
    /// cache before the next read.
    pub async fn execute_mutation(&self, mutation: &QueryRef) -> Result<QueryResult> {
        if mutation.kind != RefKind::Mutation {
            return Err(CacheError::invalid_argument(
                "only mutation refs can be executed as mutations",
            ));
        }
        let response = self
            .transport
            .invoke_mutation(&mutation.key.name, &mutation.key.variables)
            .await?;
        if !response.errors.is_empty() {
            return Err(response_error(&response));
        }
        let result = QueryResult {
            data: response.data.clone(),
            source: DataSource::Server,
            fetch_time: now_ms().to_string(),
            ref_info: mutation.key.clone(),
        };
        if self.cache.is_some() {
            self.write_queue.lock().await.push_back(PendingUpdate {
                encoded_key: self.codec.encode(&mutation.key),
                response,
            });
        }
        Ok(result)
    }

    /// Applies every queued mutation response to the cache, in order,
    /// notifying subscribers of the queries each one touched.
    pub async fn wait_for_queued_writes(&self) -> Result<()> {
        loop {
            let pending = self.write_queue.lock().await.pop_front();
            let Some(pending) = pending else {
                return Ok(());
            };
            let impacted = self
                .update_cache(&pending.encoded_key, &pending.response, now_ms())
                .await?;
            self.publish_cache_results(&impacted).await?;
        }
    }

    /// Restores a previously serialized query result into the cache
    /// and announces it to subscribers.
    pub async fn update_from_serialized(&self, serialized: &str) -> Result<QueryKey> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| CacheError::invalid_argument("no cache configured"))?;
        let stored: SerializedQueryResult = serde_json::from_str(serialized)?;
        let key = QueryKey::new(stored.ref_info.name, stored.ref_info.variables);
        let encoded = self.codec.encode(&key);
        let impacted = cache.update(&encoded, &stored.data, None, now_ms()).await?;
        self.publish_cache_results(&impacted).await?;
        Ok(key)
    }

    async fn fetch_from_server(
        &self,
        query: &QueryRef,
        encoded: &str,
        now: u64,
    ) -> Result<QueryResult> {
        let response = match self
            .transport
            .invoke_query(&query.key.name, &query.key.variables)
            .await
        {
            Ok(response) if response.errors.is_empty() => response,
            Ok(response) => {
                let err = response_error(&response);
                self.publish_error(encoded, &err).await;
                return Err(err);
            }
            Err(err) => {
                self.publish_error(encoded, &err).await;
                return Err(err);
            }
        };

        let result = QueryResult {
            data: response.data.clone(),
            source: DataSource::Server,
            fetch_time: now.to_string(),
            ref_info: query.key.clone(),
        };

        if self.cache.is_some() {
            let impacted = self.update_cache(encoded, &response, now).await?;
            self.publish_cache_results(&impacted).await?;
        } else {
            self.last_results
                .lock()
                .await
                .insert(encoded.to_string(), result.clone());
            self.notify(encoded, &result).await;
        }
        Ok(result)
    }

    async fn update_cache(
        &self,
        encoded: &str,
        response: &QueryResponse,
        now: u64,
    ) -> Result<Vec<String>> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| CacheError::invalid_argument("no cache configured"))?;
        if let Some(seconds) = max_age_from_extensions(&response.extensions) {
            cache.set_max_age_seconds(seconds);
        }
        let annotations = parse_entity_ids(&response.extensions);
        cache
            .update(encoded, &response.data, annotations.as_ref(), now)
            .await
    }

    /// Rehydrates each impacted query from the cache and delivers the
    /// refreshed result to its subscribers. No query is refetched.
    async fn publish_cache_results(&self, impacted: &[String]) -> Result<()> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return Ok(()),
        };
        for encoded in impacted {
            let Some(tree) = cache.get_result_tree(encoded).await? else {
                continue;
            };
            let data = cache
                .get_result_json(encoded)
                .await?
                .unwrap_or(Value::Null);
            let result = QueryResult {
                data,
                source: DataSource::Cache,
                fetch_time: tree.cached_at.to_string(),
                ref_info: self.codec.decode(encoded)?,
            };
            debug!(query = %result.ref_info.name, "publishing refreshed cache result");
            self.last_results
                .lock()
                .await
                .insert(encoded.clone(), result.clone());
            self.notify(encoded, &result).await;
        }
        Ok(())
    }

    async fn notify(&self, encoded: &str, result: &QueryResult) {
        let subscriptions = self.subscriptions.lock().await;
        if let Some(list) = subscriptions.get(encoded) {
            for subscription in list {
                (subscription.on_next)(result);
            }
        }
    }

    async fn publish_error(&self, encoded: &str, err: &CacheError) {
        let subscriptions = self.subscriptions.lock().await;
        if let Some(list) = subscriptions.get(encoded) {
            for subscription in list {
                if let Some(on_error) = &subscription.on_error {
                    on_error(err);
                }
            }
        }
    }
}

impl fmt::Debug for QueryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryManager")
            .field("has_cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

fn response_error(response: &QueryResponse) -> CacheError {
    CacheError::transport(format!(
        "server returned {} error(s): {}",
        response.errors.len(),
        serde_json::to_string(&response.errors).unwrap_or_default()
    ))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
