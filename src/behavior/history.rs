use crate::classify::Category;
use crate::store::{ClientStore, StoreKey};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub title: String,
    pub detected_category: Category,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Bounded ring buffer of recently seen items, oldest evicted first
#[derive(Debug, Clone)]
pub struct WatchHistory {
    entries: VecDeque<WatchHistoryEntry>,
    capacity: usize,
}

impl WatchHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Load persisted history, keeping the newest `capacity` entries.
    /// Unreadable history starts empty.
    pub fn load(store: &dyn ClientStore, capacity: usize) -> Self {
        let mut history = Self::new(capacity);

        let value = match store.get(StoreKey::WatchHistory) {
            Ok(Some(value)) => value,
            Ok(None) => return history,
            Err(e) => {
                tracing::warn!("Failed to read watch history: {}", e);
                return history;
            }
        };

        match serde_json::from_value::<Vec<WatchHistoryEntry>>(value) {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(history.capacity);
                history.entries.extend(entries.into_iter().skip(skip));
            }
            Err(e) => tracing::warn!("Discarding unreadable watch history: {}", e),
        }

        history
    }

    /// Append an entry and persist the buffer (best effort)
    pub fn append(&mut self, entry: WatchHistoryEntry, store: &dyn ClientStore) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.persist(store);
    }

    pub fn clear(&mut self, store: &dyn ClientStore) {
        self.entries.clear();
        if let Err(e) = store.remove(StoreKey::WatchHistory) {
            tracing::warn!("Failed to clear watch history: {}", e);
        }
    }

    fn persist(&self, store: &dyn ClientStore) {
        let value = match serde_json::to_value(&self.entries) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to serialize watch history: {}", e);
                return;
            }
        };
        if let Err(e) = store.set(StoreKey::WatchHistory, value) {
            tracing::warn!("Failed to persist watch history: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &WatchHistoryEntry> {
        self.entries.iter()
    }
}

impl Default for WatchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn entry(i: i64) -> WatchHistoryEntry {
        WatchHistoryEntry {
            title: format!("video {}", i),
            detected_category: Category::Neutral,
            timestamp: i,
        }
    }

    #[test]
    fn test_evicts_oldest() {
        let store = MemoryStore::new();
        let mut history = WatchHistory::new(100);
        for i in 0..150 {
            history.append(entry(i), &store);
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.iter().next().unwrap().timestamp, 50);
        assert_eq!(history.iter().last().unwrap().timestamp, 149);
    }

    #[test]
    fn test_persists_and_reloads() {
        let store = MemoryStore::new();
        let mut history = WatchHistory::new(10);
        history.append(entry(1), &store);
        history.append(entry(2), &store);

        let raw = store.get(StoreKey::WatchHistory).unwrap().unwrap();
        assert_eq!(raw[0]["detectedCategory"], json!("neutral"));

        let reloaded = WatchHistory::load(&store, 10);
        assert_eq!(reloaded.len(), 2);

        let smaller = WatchHistory::load(&store, 1);
        assert_eq!(smaller.iter().next().unwrap().timestamp, 2);
    }

    #[test]
    fn test_store_failure_keeps_memory_copy() {
        let store = MemoryStore::new();
        store.set_available(false);
        let mut history = WatchHistory::new(10);
        history.append(entry(1), &store);
        assert_eq!(history.len(), 1);
        assert!(WatchHistory::load(&store, 10).is_empty());
    }

    #[test]
    fn test_corrupt_history_starts_empty() {
        let store = MemoryStore::new();
        store.set(StoreKey::WatchHistory, json!({"not": "a list"})).unwrap();
        assert!(WatchHistory::load(&store, 10).is_empty());
    }
}
