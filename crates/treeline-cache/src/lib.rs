//! Entity-normalized query result cache.
//!
//! Query responses are decomposed into [`entity::EntityNode`] trees;
//! fields of server-annotated entities are shared across queries
//! through a pluggable [`provider::CacheProvider`], so updating one
//! query's result refreshes every cached result that references the
//! same entity. [`query_manager::QueryManager`] sits on top and drives
//! cache-first execution with transparent server fallback.

pub mod accumulator;
pub mod cache;
pub mod entity;
pub mod error;
pub mod provider;
pub mod query_manager;
pub mod result_tree;
pub mod transport;

pub use accumulator::ImpactedQueryRefs;
pub use cache::QueryCache;
pub use entity::{EncodingMode, EntityData, EntityNode, GLOBAL_ID_KEY};
pub use error::{CacheError, Code, Result};
pub use provider::{CacheProvider, MemoryCacheProvider, SqliteCacheProvider};
pub use query_manager::{
    DataSource, FetchPolicy, JsonQueryKeyCodec, QueryKey, QueryKeyCodec, QueryManager, QueryRef,
    QueryResult, RefKind,
};
pub use result_tree::{ResultTree, DEFAULT_TTL_MS};
pub use transport::{
    max_age_from_extensions, parse_entity_ids, ExtensionRecord, PathSegment, QueryResponse,
    TokenProvider, Transport,
};
