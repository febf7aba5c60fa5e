//! Per-query cache record: the normalized root plus freshness state.

use serde::{Deserialize, Serialize};

use crate::entity::EntityNode;

/// Default lifetime of a cached result, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 300_000;

/// The cached outcome of one query.
///
/// `root` holds the dehydrated structure; `serialized` is the same
/// structure as a stored string so results survive round trips through
/// persistent providers unchanged. Timestamps are milliseconds since
/// the Unix epoch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultTree {
    pub root: EntityNode,
    pub serialized: String,
    pub ttl_ms: u64,
    pub cached_at: u64,
    pub last_accessed: u64,
}

impl ResultTree {
    pub fn new(root: EntityNode, serialized: String, ttl_ms: u64, now_ms: u64) -> ResultTree {
        ResultTree {
            root,
            serialized,
            ttl_ms,
            cached_at: now_ms,
            last_accessed: now_ms,
        }
    }

    pub fn is_stale(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.cached_at) >= self.ttl_ms
    }

    pub fn update_accessed(&mut self, now_ms: u64) {
        self.last_accessed = now_ms;
    }
}
