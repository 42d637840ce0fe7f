//! Routing decision cache.
//!
//! Memoises [`RoutingResult`]s per decision cache key with a fixed TTL and
//! an upper bound on entries. Lookups evict expired entries lazily.
//!
//! Two concurrent misses for the same key both compute and the later
//! `insert` wins; there is no single-flight coordination.

use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::{RoutingContent, RoutingResult};

/// User label hashed into the key for anonymous routing calls.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone)]
struct CachedRouting {
    result: RoutingResult,
    cached_at: Instant,
}

/// TTL-bounded, size-bounded result cache.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug)]
pub struct DecisionCache {
    store: DashMap<String, CachedRouting>,
    ttl: Duration,
    max_entries: usize,
}

impl DecisionCache {
    /// Create a cache. `max_entries == 0` means unbounded.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Fresh cached result for `key`, evicting it if expired.
    pub fn get(&self, key: &str) -> Option<RoutingResult> {
        if let Some(entry) = self.store.get(key) {
            if entry.cached_at.elapsed() < self.ttl {
                debug!(cache_key = key, "routing cache hit");
                return Some(entry.result.clone());
            }
            drop(entry);
            if self.evict_if_expired(key) {
                debug!(cache_key = key, "routing cache entry expired");
            }
        }
        None
    }

    /// Remove `key` only if its entry is still expired. An entry refreshed
    /// by a concurrent `insert` survives.
    fn evict_if_expired(&self, key: &str) -> bool {
        let ttl = self.ttl;
        self.store
            .remove_if(key, |_, entry| entry.cached_at.elapsed() >= ttl)
            .is_some()
    }

    /// Store `result` under `key`, evicting the oldest entry when full.
    pub fn insert(&self, key: impl Into<String>, result: RoutingResult) {
        let key = key.into();
        if self.max_entries > 0
            && self.store.len() >= self.max_entries
            && !self.store.contains_key(&key)
        {
            // Collect the key first so no read guard is held across remove.
            let oldest = self
                .store
                .iter()
                .min_by_key(|e| e.value().cached_at)
                .map(|e| e.key().clone());
            if let Some(evict) = oldest {
                self.store.remove(&evict);
                debug!(cache_key = %evict, "routing cache full, evicted oldest entry");
            }
        }
        self.store.insert(
            key,
            CachedRouting {
                result,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        let ttl = self.ttl;
        self.store.retain(|_, entry| entry.cached_at.elapsed() < ttl);
        before.saturating_sub(self.store.len())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.store.clear();
        debug!("routing cache cleared");
    }

    /// Number of entries, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Decision cache key for `content` routed on behalf of `user_id`.
///
/// Hashes the content id, both scores (bitwise) and the user id, or
/// [`ANONYMOUS_USER`] when absent.
pub fn cache_key(content: &RoutingContent, user_id: Option<&str>) -> String {
    use std::collections::hash_map::DefaultHasher;

    let mut hasher = DefaultHasher::new();
    content.content_id.hash(&mut hasher);
    content.quality_score.to_bits().hash(&mut hasher);
    content.urgency_score.to_bits().hash(&mut hasher);
    user_id.unwrap_or(ANONYMOUS_USER).hash(&mut hasher);
    format!("routing:{:016x}", hasher.finish())
}
