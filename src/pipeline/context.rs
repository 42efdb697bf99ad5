use super::InterventionDecision;
use crate::cache::TtlCache;
use crate::classify::Classification;
use crate::feed::{FeedItem, ItemId};
use crate::recommend::{Alternative, Rotation};
use crate::scoring::RiskTier;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-session counters
#[derive(Debug, Default)]
pub struct SessionStats {
    processed: AtomicU64,
    rejected: AtomicU64,
    interventions: AtomicU64,
    alternatives_shown: AtomicU64,
    llm_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub processed: u64,
    pub rejected: u64,
    pub interventions: u64,
    pub alternatives_shown: u64,
    pub llm_failures: u64,
}

impl SessionStats {
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intervention(&self) {
        self.interventions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alternative_shown(&self) {
        self.alternatives_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_failure(&self) {
        self.llm_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            interventions: self.interventions.load(Ordering::Relaxed),
            alternatives_shown: self.alternatives_shown.load(Ordering::Relaxed),
            llm_failures: self.llm_failures.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.processed,
            &self.rejected,
            &self.interventions,
            &self.alternatives_shown,
            &self.llm_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Everything the pipeline remembers for one session
///
/// Refinements spawned before a `reset` carry the old generation and are
/// ignored when they complete.
pub struct PipelineContext {
    session_id: Uuid,
    generation: AtomicU64,
    classifications: Mutex<HashMap<(ItemId, String), Classification>>,
    in_flight: Mutex<HashSet<ItemId>>,
    alternatives: TtlCache<Vec<Alternative>>,
    rotation: Mutex<Rotation>,
    finalized: Mutex<HashMap<ItemId, InterventionDecision>>,
    provisional: Mutex<HashMap<ItemId, InterventionDecision>>,
    sighted: Mutex<HashSet<ItemId>>,
    tiers: Mutex<HashMap<ItemId, RiskTier>>,
    stats: SessionStats,
}

impl PipelineContext {
    pub fn new(alternative_ttl: Duration) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            generation: AtomicU64::new(0),
            classifications: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            alternatives: TtlCache::new(alternative_ttl),
            rotation: Mutex::new(Rotation::default()),
            finalized: Mutex::new(HashMap::new()),
            provisional: Mutex::new(HashMap::new()),
            sighted: Mutex::new(HashSet::new()),
            tiers: Mutex::new(HashMap::new()),
            stats: SessionStats::default(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn alternatives(&self) -> &TtlCache<Vec<Alternative>> {
        &self.alternatives
    }

    pub fn rotation(&self) -> MutexGuard<'_, Rotation> {
        lock(&self.rotation)
    }

    pub fn cached_classification(&self, item: &FeedItem) -> Option<Classification> {
        lock(&self.classifications)
            .get(&(item.id.clone(), item.title_hash()))
            .copied()
    }

    pub fn store_classification(&self, item: &FeedItem, classification: Classification) {
        lock(&self.classifications).insert((item.id.clone(), item.title_hash()), classification);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        lock(&self.in_flight).contains(id)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Mark a refinement as started; false when one is already pending
    pub fn begin_refinement(&self, id: &str) -> bool {
        lock(&self.in_flight).insert(id.to_string())
    }

    /// Record the outcome of a refinement started in `generation`
    pub fn finish_refinement(
        &self,
        generation: u64,
        item: &FeedItem,
        classification: Classification,
    ) {
        if generation != self.generation() {
            tracing::debug!("Dropping refinement for '{}' from a previous session", item.title);
            return;
        }
        self.store_classification(item, classification);
        lock(&self.in_flight).remove(&item.id);
    }

    pub fn finalized(&self, id: &str) -> Option<InterventionDecision> {
        lock(&self.finalized).get(id).cloned()
    }

    pub fn finalize(&self, decision: InterventionDecision) {
        lock(&self.finalized).insert(decision.item_id.clone(), decision);
    }

    /// Decision held for `id` while its refinement is pending
    pub fn provisional(&self, id: &str) -> Option<InterventionDecision> {
        lock(&self.provisional).get(id).cloned()
    }

    pub fn hold_provisional(&self, decision: InterventionDecision) {
        lock(&self.provisional).insert(decision.item_id.clone(), decision);
    }

    pub fn take_provisional(&self, id: &str) -> Option<InterventionDecision> {
        lock(&self.provisional).remove(id)
    }

    pub fn finalized_count(&self) -> usize {
        lock(&self.finalized).len()
    }

    /// True the first time `id` is sighted this session
    pub fn record_sighting(&self, id: &str) -> bool {
        lock(&self.sighted).insert(id.to_string())
    }

    /// Tier from an earlier evaluation of `id`, replaced by `tier`
    pub fn swap_tier(&self, id: &str, tier: RiskTier) -> Option<RiskTier> {
        lock(&self.tiers).insert(id.to_string(), tier)
    }

    pub fn previous_tier(&self, id: &str) -> Option<RiskTier> {
        lock(&self.tiers).get(id).copied()
    }

    /// Forget everything from this session
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.classifications).clear();
        lock(&self.in_flight).clear();
        self.alternatives.clear();
        lock(&self.rotation).reset();
        lock(&self.finalized).clear();
        lock(&self.provisional).clear();
        lock(&self.sighted).clear();
        lock(&self.tiers).clear();
        self.stats.reset();
        tracing::debug!("Pipeline context {} reset", self.session_id);
    }
}
