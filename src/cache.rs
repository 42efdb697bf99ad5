// Sharded TTL cache
//
// Keys are spread over a fixed number of shards by an ahash of the key, so
// concurrent server requests only contend on the shard they touch. Expired
// entries are invisible to readers and dropped by `sweep`.

use ahash::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

const DEFAULT_SHARDS: usize = 8;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

pub struct TtlCache<T> {
    shards: Vec<RwLock<HashMap<String, CacheEntry<T>>>>,
    hasher: RandomState,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_shards(ttl, DEFAULT_SHARDS)
    }

    pub fn with_shards(ttl: Duration, shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
            ttl,
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, CacheEntry<T>>> {
        let index = (BuildHasher::hash_one(&self.hasher, key) as usize) % self.shards.len();
        &self.shards[index]
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &str) -> Option<T> {
        let shard = self.shard(key).read().unwrap_or_else(PoisonError::into_inner);
        shard
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl, Instant::now()))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let mut shard = self.shard(&key).write().unwrap_or_else(PoisonError::into_inner);
        shard.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        let mut shard = self.shard(key).write().unwrap_or_else(PoisonError::into_inner);
        shard.remove(key).map(|entry| entry.value)
    }

    /// Drop expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write().unwrap_or_else(PoisonError::into_inner);
            let before = shard.len();
            shard.retain(|_, entry| !entry.is_expired(self.ttl, now));
            removed += before - shard.len();
        }
        removed
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}
