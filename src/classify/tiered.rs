use super::{Classification, Classifier, HeuristicClassifier, HeuristicOutcome};
use crate::error::Result;
use crate::feed::FeedItem;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Heuristic first, refiner only for ambiguous items
///
/// The refiner's answer supersedes the heuristic one. A refiner failure or
/// timeout keeps the heuristic answer.
pub struct TieredClassifier {
    heuristic: HeuristicClassifier,
    refiner: Option<Arc<dyn Classifier>>,
    timeout: Duration,
}

impl TieredClassifier {
    pub fn new(
        heuristic: HeuristicClassifier,
        refiner: Option<Arc<dyn Classifier>>,
        timeout: Duration,
    ) -> Self {
        Self {
            heuristic,
            refiner,
            timeout,
        }
    }

    pub fn heuristic(&self, item: &FeedItem) -> HeuristicOutcome {
        self.heuristic.evaluate(item)
    }

    /// The refiner to consult for this outcome, if any
    pub fn refiner_for(&self, outcome: &HeuristicOutcome) -> Option<Arc<dyn Classifier>> {
        if outcome.ambiguous {
            self.refiner.clone()
        } else {
            None
        }
    }

    pub fn has_refiner(&self) -> bool {
        self.refiner.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Run a refiner under a deadline; `None` on failure or timeout
pub async fn refine_with_timeout(
    refiner: Arc<dyn Classifier>,
    item: &FeedItem,
    timeout: Duration,
) -> Option<Classification> {
    match tokio::time::timeout(timeout, refiner.classify(item)).await {
        Ok(Ok(classification)) => Some(classification),
        Ok(Err(e)) => {
            tracing::warn!(
                "{} classifier failed for '{}', keeping heuristic: {}",
                refiner.name(),
                item.title,
                e
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                "{} classifier timed out after {}ms for '{}', keeping heuristic",
                refiner.name(),
                timeout.as_millis(),
                item.title
            );
            None
        }
    }
}

#[async_trait]
impl Classifier for TieredClassifier {
    fn name(&self) -> &str {
        "tiered"
    }

    /// Awaits the refiner (bounded) when the heuristic is ambiguous
    async fn classify(&self, item: &FeedItem) -> Result<Classification> {
        let outcome = self.heuristic(item);
        let refined = match self.refiner_for(&outcome) {
            Some(refiner) => refine_with_timeout(refiner, item, self.timeout).await,
            None => None,
        };
        Ok(refined.unwrap_or(outcome.classification))
    }
}
