//! Behavior learning state machine
//!
//! On first run interventions stay off while the user's baseline habits are
//! observed. Once the learning period has elapsed the machine flips to
//! Active and persists the completion time; a completion younger than the
//! validity window survives reloads, an older one starts learning over.

mod history;
mod insights;

pub use history::{WatchHistory, WatchHistoryEntry};
pub use insights::{Insights, Trend};

use crate::store::{ClientStore, StoreKey};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock moved by hand, for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
    Learning,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningState {
    pub mode: LearningMode,
    pub learning_started_at: i64,
    pub completed_at: Option<i64>,
}

pub struct LearningStateMachine {
    state: LearningState,
    duration: Duration,
    validity: Duration,
}

impl LearningStateMachine {
    /// Fresh learning period starting at `now_ms`
    pub fn new(now_ms: i64, duration: Duration, validity: Duration) -> Self {
        Self {
            state: LearningState {
                mode: LearningMode::Learning,
                learning_started_at: now_ms,
                completed_at: None,
            },
            duration,
            validity,
        }
    }

    /// Resume from persisted state. Store failures start a fresh learning
    /// period.
    pub fn restore(
        store: &dyn ClientStore,
        now_ms: i64,
        duration: Duration,
        validity: Duration,
    ) -> Self {
        let mut machine = Self::new(now_ms, duration, validity);

        let complete = match store.get_bool(StoreKey::LearningComplete) {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!("Failed to read learning state: {}", e);
                return machine;
            }
        };
        let completed_at = match store.get_i64(StoreKey::LearningCompletedAt) {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!("Failed to read learning completion time: {}", e);
                return machine;
            }
        };

        match (complete, completed_at) {
            (true, Some(at)) if machine.within_validity(at, now_ms) => {
                tracing::info!("Learning completed earlier, starting active");
                machine.state.mode = LearningMode::Active;
                machine.state.completed_at = Some(at);
            }
            (false, None) => {
                tracing::info!("No prior learning, observing for {:?}", duration);
            }
            _ => {
                tracing::info!("Prior learning expired, observing again");
                clear_persisted(store);
            }
        }

        machine
    }

    fn within_validity(&self, completed_at: i64, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(completed_at);
        age >= 0 && (age as u128) < self.validity.as_millis()
    }

    /// Advance the machine to `now_ms`, persisting transitions best effort
    pub fn tick(&mut self, now_ms: i64, store: &dyn ClientStore) -> LearningMode {
        match self.state.mode {
            LearningMode::Learning => {
                let elapsed = now_ms.saturating_sub(self.state.learning_started_at).max(0);
                if elapsed as u128 >= self.duration.as_millis() {
                    self.state.mode = LearningMode::Active;
                    self.state.completed_at = Some(now_ms);
                    tracing::info!("Learning complete, interventions active");

                    if let Err(e) = store.set(StoreKey::LearningComplete, json!(true)) {
                        tracing::warn!("Failed to persist learning completion: {}", e);
                    }
                    if let Err(e) = store.set(StoreKey::LearningCompletedAt, json!(now_ms)) {
                        tracing::warn!("Failed to persist learning completion time: {}", e);
                    }
                }
            }
            LearningMode::Active => {
                if let Some(at) = self.state.completed_at {
                    if !self.within_validity(at, now_ms) {
                        tracing::info!("Learning validity elapsed, observing again");
                        clear_persisted(store);
                        *self = Self::new(now_ms, self.duration, self.validity);
                    }
                }
            }
        }
        self.state.mode
    }

    pub fn state(&self) -> LearningState {
        self.state
    }

    pub fn mode(&self) -> LearningMode {
        self.state.mode
    }

    pub fn is_active(&self) -> bool {
        self.state.mode == LearningMode::Active
    }

    /// Time left in the learning period, zero once active
    pub fn remaining(&self, now_ms: i64) -> Duration {
        if self.is_active() {
            return Duration::ZERO;
        }
        let elapsed = now_ms.saturating_sub(self.state.learning_started_at).max(0) as u64;
        self.duration.saturating_sub(Duration::from_millis(elapsed))
    }
}

fn clear_persisted(store: &dyn ClientStore) {
    for key in [StoreKey::LearningComplete, StoreKey::LearningCompletedAt] {
        if let Err(e) = store.remove(key) {
            tracing::warn!("Failed to clear {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;

    fn durations() -> (Duration, Duration) {
        (Duration::from_secs(180), Duration::from_secs(24 * 3600))
    }

    #[test]
    fn test_first_run_learns_then_activates() {
        let store = MemoryStore::new();
        let (duration, validity) = durations();
        let start = 1_000_000;
        let mut machine = LearningStateMachine::restore(&store, start, duration, validity);

        assert_eq!(machine.mode(), LearningMode::Learning);
        assert_eq!(machine.tick(start + 2 * MINUTE, &store), LearningMode::Learning);
        assert_eq!(machine.remaining(start + 2 * MINUTE), Duration::from_secs(60));

        assert_eq!(machine.tick(start + 3 * MINUTE, &store), LearningMode::Active);
        assert_eq!(store.get_bool(StoreKey::LearningComplete).unwrap(), Some(true));
        assert_eq!(
            store.get_i64(StoreKey::LearningCompletedAt).unwrap(),
            Some(start + 3 * MINUTE)
        );
    }

    #[test]
    fn test_recent_completion_restores_active() {
        let store = MemoryStore::new();
        let (duration, validity) = durations();
        let now = 100 * HOUR;
        store.set(StoreKey::LearningComplete, json!(true)).unwrap();
        store
            .set(StoreKey::LearningCompletedAt, json!(now - 23 * HOUR))
            .unwrap();

        let machine = LearningStateMachine::restore(&store, now, duration, validity);
        assert!(machine.is_active());
        assert_eq!(machine.state().completed_at, Some(now - 23 * HOUR));
    }

    #[test]
    fn test_stale_completion_resets() {
        let store = MemoryStore::new();
        let (duration, validity) = durations();
        let now = 100 * HOUR;
        store.set(StoreKey::LearningComplete, json!(true)).unwrap();
        store
            .set(StoreKey::LearningCompletedAt, json!(now - 24 * HOUR))
            .unwrap();

        let machine = LearningStateMachine::restore(&store, now, duration, validity);
        assert_eq!(machine.mode(), LearningMode::Learning);
        assert_eq!(machine.state().learning_started_at, now);
        assert!(store.get(StoreKey::LearningComplete).unwrap().is_none());
        assert!(store.get(StoreKey::LearningCompletedAt).unwrap().is_none());
    }

    #[test]
    fn test_unavailable_store_still_transitions() {
        let store = MemoryStore::new();
        store.set_available(false);
        let (duration, validity) = durations();

        let mut machine = LearningStateMachine::restore(&store, 0, duration, validity);
        assert_eq!(machine.mode(), LearningMode::Learning);
        assert_eq!(machine.tick(3 * MINUTE, &store), LearningMode::Active);
    }

    #[test]
    fn test_active_decays_after_validity() {
        let store = MemoryStore::new();
        let (duration, validity) = durations();
        let mut machine = LearningStateMachine::new(0, duration, validity);
        machine.tick(3 * MINUTE, &store);
        assert!(machine.is_active());

        assert_eq!(machine.tick(3 * MINUTE + 24 * HOUR, &store), LearningMode::Learning);
        assert!(store.get(StoreKey::LearningCompletedAt).unwrap().is_none());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 2010);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }
}
