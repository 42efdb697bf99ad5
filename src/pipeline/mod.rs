//! Intervention pipeline
//!
//! The orchestrator runs each raw feed item through normalize → classify →
//! score → recommend, applies the learning gate and produces an
//! [`InterventionDecision`]. Per-session state lives in [`PipelineContext`].

mod context;
mod scanner;

pub use context::{PipelineContext, SessionStats, StatsSnapshot};
pub use scanner::{
    DecisionSink, FeedSource, LogSink, RecordingSink, ReplayFeedSource, ScanReport, Scanner,
};

use crate::behavior::{
    Clock, Insights, LearningMode, LearningState, LearningStateMachine, WatchHistory,
    WatchHistoryEntry,
};
use crate::classify::{
    build_refiner, refine_with_timeout, Classification, Classifier, HeuristicClassifier,
    TieredClassifier,
};
use crate::config::Config;
use crate::error::Result;
use crate::feed::{normalize, FeedItem, ItemId, RawFeedItem, Rejection};
use crate::recommend::{Alternative, RecommendationEngine, RecommendationSource};
use crate::scoring::{RiskScore, RiskScorer, RiskTier, WeightedRiskScorer};
use crate::store::{ClientStore, StoreKey};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    None,
    Blur,
    Remove,
    Substitute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionDecision {
    pub item_id: ItemId,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<Alternative>,
}

impl InterventionDecision {
    pub fn none(item_id: ItemId) -> Self {
        Self {
            item_id,
            action: Action::None,
            alternative: None,
        }
    }

    pub fn blur(item_id: ItemId) -> Self {
        Self {
            item_id,
            action: Action::Blur,
            alternative: None,
        }
    }

    pub fn remove(item_id: ItemId) -> Self {
        Self {
            item_id,
            action: Action::Remove,
            alternative: None,
        }
    }

    pub fn substitute(item_id: ItemId, alternative: Alternative) -> Self {
        Self {
            item_id,
            action: Action::Substitute,
            alternative: Some(alternative),
        }
    }

    pub fn is_intervention(&self) -> bool {
        self.action != Action::None
    }
}

/// Full result of a one-off analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub item: FeedItem,
    pub classification: Classification,
    pub score: RiskScore,
    pub action: Action,
    pub alternative: Option<Alternative>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
    classifier: Arc<TieredClassifier>,
    scorer: Arc<dyn RiskScorer>,
    engine: Arc<RecommendationEngine>,
    learning: Mutex<LearningStateMachine>,
    history: Mutex<WatchHistory>,
    store: Arc<dyn ClientStore>,
    clock: Arc<dyn Clock>,
    block_threshold: u8,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the pipeline from configuration, picking the refiner and search
    /// source the configuration and client store ask for
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ClientStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let refiner = build_refiner(config, store.as_ref());
        let engine = RecommendationEngine::from_config(config)?;
        Self::with_parts(config, store, clock, refiner, engine)
    }

    /// Build the pipeline with an explicit refiner and search source
    pub fn new(
        config: &Config,
        store: Arc<dyn ClientStore>,
        clock: Arc<dyn Clock>,
        refiner: Option<Arc<dyn Classifier>>,
        source: Option<Arc<dyn RecommendationSource>>,
    ) -> Result<Self> {
        let engine = RecommendationEngine::new(
            config.recommendation.pool.clone(),
            source,
            config.recommendation.min_tier,
            config.recommendation_timeout()?,
        );
        Self::with_parts(config, store, clock, refiner, engine)
    }

    fn with_parts(
        config: &Config,
        store: Arc<dyn ClientStore>,
        clock: Arc<dyn Clock>,
        refiner: Option<Arc<dyn Classifier>>,
        engine: RecommendationEngine,
    ) -> Result<Self> {
        let heuristic =
            HeuristicClassifier::new(&config.classifier.keywords, config.classifier.ambiguity_margin)?;
        let classifier = TieredClassifier::new(heuristic, refiner, config.llm_timeout()?);

        let now = clock.now_ms();
        let learning = LearningStateMachine::restore(
            store.as_ref(),
            now,
            config.learning_duration()?,
            config.learning_validity()?,
        );
        let history = WatchHistory::load(store.as_ref(), config.history.capacity);

        let ctx = Arc::new(PipelineContext::new(config.recommendation_ttl()?));
        info!(
            "Pipeline session {} ready ({:?}, {} history entries)",
            ctx.session_id(),
            learning.mode(),
            history.len()
        );

        Ok(Self {
            ctx,
            classifier: Arc::new(classifier),
            scorer: Arc::new(WeightedRiskScorer::new()),
            engine: Arc::new(engine),
            learning: Mutex::new(learning),
            history: Mutex::new(history),
            store,
            clock,
            block_threshold: config.scoring.block_threshold,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// Master switch, on unless the store says otherwise
    pub fn is_enabled(&self) -> bool {
        match self.store.get_bool(StoreKey::ZenfeedActive) {
            Ok(flag) => flag.unwrap_or(true),
            Err(e) => {
                warn!("Failed to read {}: {}", StoreKey::ZenfeedActive, e);
                true
            }
        }
    }

    /// Decide what to do about one visible feed item
    pub async fn process(&self, raw: &RawFeedItem) -> InterventionDecision {
        if !self.is_enabled() {
            let id = normalize(raw).map(|item| item.id).unwrap_or_default();
            return InterventionDecision::none(id);
        }

        let item = match normalize(raw) {
            Ok(item) => item,
            Err(rejection) => {
                self.ctx.stats().record_rejected();
                debug!("Rejected feed item: {}", rejection);
                return InterventionDecision::none(ItemId::new());
            }
        };

        if let Some(decision) = self.ctx.finalized(&item.id) {
            return decision;
        }
        if self.ctx.is_in_flight(&item.id) {
            if let Some(decision) = self.ctx.provisional(&item.id) {
                return decision;
            }
        }

        self.ctx.stats().record_processed();
        let now = self.clock.now_ms();

        let (classification, provisional) = self.classify(&item);
        let score = self.scorer.score(&item, &classification);
        debug!(
            "'{}' => {} ({:?}) risk {} {}{}",
            item.title,
            classification.category,
            classification.source,
            score.value,
            score.tier,
            if provisional { " provisional" } else { "" }
        );

        let history_len = {
            let mut history = lock(&self.history);
            if self.ctx.record_sighting(&item.id) {
                history.append(
                    WatchHistoryEntry {
                        title: item.title.clone(),
                        detected_category: classification.category,
                        timestamp: now,
                    },
                    self.store.as_ref(),
                );
            }
            history.len()
        };

        let previous_tier = if provisional {
            self.ctx.previous_tier(&item.id)
        } else {
            self.ctx.swap_tier(&item.id, score.tier)
        };

        let mode = lock(&self.learning).tick(now, self.store.as_ref());
        if mode == LearningMode::Learning {
            return InterventionDecision::none(item.id);
        }

        // a held provisional decision keeps its alternative and its count
        let held = if provisional {
            None
        } else {
            self.ctx.take_provisional(&item.id)
        };
        let held_alternative = held.as_ref().and_then(|d| d.alternative.clone());

        let decision = if previous_tier.is_some_and(|tier| tier >= RiskTier::High) {
            InterventionDecision::remove(item.id.clone())
        } else if score.value >= self.block_threshold {
            let alternative = match held_alternative {
                Some(alternative) => Some(alternative),
                None => self.engine.suggest(&self.ctx, &score, history_len).await,
            };
            match alternative {
                Some(alternative) => InterventionDecision::substitute(item.id.clone(), alternative),
                None => InterventionDecision::blur(item.id.clone()),
            }
        } else {
            InterventionDecision::none(item.id.clone())
        };

        let counted = held.as_ref().is_some_and(InterventionDecision::is_intervention);
        if decision.is_intervention() && !counted {
            self.ctx.stats().record_intervention();
        }
        if provisional {
            self.ctx.hold_provisional(decision.clone());
        } else {
            self.ctx.finalize(decision.clone());
        }
        decision
    }

    /// Cached classification, or the heuristic one plus whether it is
    /// provisional while a refinement runs in the background
    fn classify(&self, item: &FeedItem) -> (Classification, bool) {
        if let Some(cached) = self.ctx.cached_classification(item) {
            return (cached, false);
        }

        let outcome = self.classifier.heuristic(item);
        if self.ctx.is_in_flight(&item.id) {
            return (outcome.classification, true);
        }

        let Some(refiner) = self.classifier.refiner_for(&outcome) else {
            self.ctx.store_classification(item, outcome.classification);
            return (outcome.classification, false);
        };

        if self.ctx.begin_refinement(&item.id) {
            let ctx = Arc::clone(&self.ctx);
            let generation = ctx.generation();
            let owned = item.clone();
            let timeout = self.classifier.timeout();
            let fallback = outcome.classification;

            let handle = tokio::spawn(async move {
                let refined = refine_with_timeout(refiner, &owned, timeout).await;
                if refined.is_none() {
                    ctx.stats().record_llm_failure();
                }
                ctx.finish_refinement(generation, &owned, refined.unwrap_or(fallback));
            });

            let mut tasks = lock(&self.tasks);
            tasks.retain(|task| !task.is_finished());
            tasks.push(handle);
        }

        (outcome.classification, true)
    }

    /// One-off analysis for the HTTP surface. Awaits the refiner (bounded)
    /// and skips the learning gate.
    pub async fn analyze(&self, raw: &RawFeedItem) -> std::result::Result<Analysis, Rejection> {
        let item = normalize(raw)?;

        let classification = match self.classifier.classify(&item).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classification failed for '{}': {}", item.title, e);
                self.classifier.heuristic(&item).classification
            }
        };
        let score = self.scorer.score(&item, &classification);

        let (action, alternative) = if score.value >= self.block_threshold {
            let history_len = lock(&self.history).len();
            match self.engine.suggest(&self.ctx, &score, history_len).await {
                Some(alternative) => (Action::Substitute, Some(alternative)),
                None => (Action::Blur, None),
            }
        } else {
            (Action::None, None)
        };

        Ok(Analysis {
            item,
            classification,
            score,
            action,
            alternative,
        })
    }

    /// Alternatives for an explicit query
    pub async fn recommend(&self, query: &str, max_results: usize) -> Vec<Alternative> {
        self.engine.search(&self.ctx, query, max_results).await
    }

    /// Wait for background refinements to finish
    pub async fn drain(&self) {
        let tasks: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        debug!("Waiting for {} background refinements", tasks.len());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Refinement task failed: {}", e);
            }
        }
    }

    pub fn learning_state(&self) -> LearningState {
        lock(&self.learning).state()
    }

    /// Advance the learning clock without processing an item
    pub fn tick_learning(&self) -> LearningState {
        let now = self.clock.now_ms();
        let mut learning = lock(&self.learning);
        learning.tick(now, self.store.as_ref());
        learning.state()
    }

    pub fn history(&self) -> WatchHistory {
        lock(&self.history).clone()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear(self.store.as_ref());
    }

    pub fn insights(&self) -> Insights {
        Insights::from_history(&lock(&self.history))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats().snapshot()
    }

    /// Tear down the session
    pub fn reset(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.ctx.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::ManualClock;
    use crate::classify::{Category, MockClassifier};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000_000;

    fn active_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(StoreKey::LearningComplete, json!(true)).unwrap();
        store
            .set(StoreKey::LearningCompletedAt, json!(NOW - 60_000))
            .unwrap();
        store
    }

    fn orchestrator(
        store: Arc<MemoryStore>,
        refiner: Option<Arc<dyn Classifier>>,
    ) -> Orchestrator {
        Orchestrator::new(
            &Config::default(),
            store,
            Arc::new(ManualClock::new(NOW)),
            refiner,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rejected_items_are_counted() {
        let orchestrator = orchestrator(active_store(), None);
        let decision = orchestrator.process(&RawFeedItem::titled("   ")).await;
        assert_eq!(decision.action, Action::None);
        assert_eq!(orchestrator.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_master_switch_off() {
        let store = active_store();
        store.set(StoreKey::ZenfeedActive, json!(false)).unwrap();
        let orchestrator = orchestrator(store, None);

        let raw = RawFeedItem::titled("Try Not To Laugh Compilation").with_duration_seconds(30.0);
        assert_eq!(orchestrator.process(&raw).await.action, Action::None);
        assert_eq!(orchestrator.stats().processed, 0);
    }

    #[tokio::test]
    async fn test_provisional_until_refined() {
        let refiner = Arc::new(MockClassifier::answering(Category::Addictive));
        let orchestrator = orchestrator(active_store(), Some(refiner.clone() as Arc<dyn Classifier>));

        // No keywords: heuristic is Neutral at 600s, refiner says Addictive
        let raw = RawFeedItem::titled("Weekend at the lake")
            .with_duration_seconds(600.0)
            .with_source_url("https://youtube.com/watch?v=lake");

        let first = orchestrator.process(&raw).await;
        assert_eq!(first.action, Action::None);
        assert!(orchestrator.context().finalized(&first.item_id).is_none());

        orchestrator.drain().await;

        let second = orchestrator.process(&raw).await;
        assert_eq!(second.action, Action::Substitute);
        assert_eq!(refiner.calls(), 1);
        assert_eq!(orchestrator.context().finalized(&second.item_id), Some(second));
    }

    #[tokio::test]
    async fn test_refiner_failure_keeps_heuristic() {
        let orchestrator = orchestrator(
            active_store(),
            Some(Arc::new(MockClassifier::failing().with_delay(Duration::from_millis(5)))),
        );
        let raw = RawFeedItem::titled("Weekend at the lake").with_duration_seconds(600.0);

        orchestrator.process(&raw).await;
        orchestrator.drain().await;
        let decision = orchestrator.process(&raw).await;

        assert_eq!(decision.action, Action::None);
        assert_eq!(orchestrator.stats().llm_failures, 1);
    }

    #[tokio::test]
    async fn test_analyze_skips_learning_gate() {
        let orchestrator = orchestrator(Arc::new(MemoryStore::new()), None);
        assert!(orchestrator.learning_state().completed_at.is_none());

        let raw = RawFeedItem::titled("Try Not To Laugh - Funny Memes Compilation")
            .with_duration_seconds(45.0);
        let analysis = orchestrator.analyze(&raw).await.unwrap();
        assert_eq!(analysis.classification.category, Category::Addictive);
        assert_eq!(analysis.action, Action::Substitute);
        assert!(analysis.alternative.is_some());
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_title() {
        let orchestrator = orchestrator(active_store(), None);
        assert_eq!(
            orchestrator.analyze(&RawFeedItem::titled("")).await,
            Err(Rejection::EmptyTitle)
        );
    }

    #[test]
    fn test_decision_serialization() {
        let decision = InterventionDecision::blur("abc".to_string());
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json, json!({"itemId": "abc", "action": "blur"}));
    }
}
