//! Recommendation engine
//!
//! Picks a productive category from a rotating pool and resolves it to a
//! concrete alternative through an external search source, a TTL cache and,
//! when all else fails, a synthetic search link. Never fails.

mod youtube;

pub use youtube::YouTubeSearchSource;

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::PipelineContext;
use crate::scoring::{RiskScore, RiskTier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A productive item offered in place of a risky one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub title: String,
    pub url: String,
    /// The pool query this alternative answers
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// External video search
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Alternative>>;
}

/// Session rotation over the category pool
///
/// Categories already surfaced this session are skipped until every category
/// has been shown, then the surfaced set starts over.
#[derive(Debug, Default)]
pub struct Rotation {
    cursor: usize,
    surfaced: HashSet<usize>,
    seeded: bool,
}

impl Rotation {
    /// Index of the next category. The first call in a session seeds the
    /// cursor from `seed`.
    pub fn next(&mut self, pool_len: usize, seed: usize) -> Option<usize> {
        if pool_len == 0 {
            return None;
        }
        if !self.seeded {
            self.cursor = seed % pool_len;
            self.seeded = true;
        }
        if self.surfaced.len() >= pool_len {
            self.surfaced.clear();
        }

        for _ in 0..pool_len {
            let index = self.cursor % pool_len;
            self.cursor = (index + 1) % pool_len;
            if self.surfaced.insert(index) {
                return Some(index);
            }
        }
        None
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct RecommendationEngine {
    pool: Vec<String>,
    source: Option<Arc<dyn RecommendationSource>>,
    min_tier: RiskTier,
    timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(
        pool: Vec<String>,
        source: Option<Arc<dyn RecommendationSource>>,
        min_tier: RiskTier,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            source,
            min_tier,
            timeout,
        }
    }

    /// Build from configuration. Search stays off when disabled or when the
    /// API key is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Option<Arc<dyn RecommendationSource>> = if config.search.enabled {
            match YouTubeSearchSource::from_config(&config.search) {
                Ok(source) => Some(Arc::new(source)),
                Err(e) => {
                    tracing::warn!("Video search disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::new(
            config.recommendation.pool.clone(),
            source,
            config.recommendation.min_tier,
            config.recommendation_timeout()?,
        ))
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// One alternative for an item at `score`, or `None` when the tier is
    /// below the configured minimum. `history_len` seeds the rotation on
    /// first use in a session.
    pub async fn suggest(
        &self,
        ctx: &PipelineContext,
        score: &RiskScore,
        history_len: usize,
    ) -> Option<Alternative> {
        if score.tier < self.min_tier {
            tracing::debug!("Tier {} below {}, no alternative", score.tier, self.min_tier);
            return None;
        }

        let index = ctx.rotation().next(self.pool.len(), history_len)?;
        let query = &self.pool[index];

        let alternative = self
            .search(ctx, query, 1)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| synthetic_alternative(query, None));

        ctx.stats().record_alternative_shown();
        tracing::debug!("Suggesting '{}' for category '{}'", alternative.title, query);
        Some(alternative)
    }

    /// Up to `max_results` alternatives for `query`. Cached results are
    /// served until they expire; search failures yield synthetic links that
    /// are not cached.
    pub async fn search(
        &self,
        ctx: &PipelineContext,
        query: &str,
        max_results: usize,
    ) -> Vec<Alternative> {
        let max_results = max_results.max(1);
        let key = format!("{}:{}", query, max_results);

        if let Some(cached) = ctx.alternatives().get(&key) {
            tracing::debug!("Alternative cache hit for '{}'", key);
            return cached;
        }

        let Some(source) = &self.source else {
            return synthetic_alternatives(query, max_results);
        };

        match tokio::time::timeout(self.timeout, source.search(query, max_results)).await {
            Ok(Ok(results)) if !results.is_empty() => {
                let results: Vec<Alternative> = results.into_iter().take(max_results).collect();
                ctx.alternatives().insert(key, results.clone());
                results
            }
            Ok(Ok(_)) => {
                tracing::warn!("{} returned no results for '{}'", source.name(), query);
                synthetic_alternatives(query, max_results)
            }
            Ok(Err(e)) => {
                tracing::warn!("{} search failed for '{}': {}", source.name(), query, e);
                synthetic_alternatives(query, max_results)
            }
            Err(_) => {
                tracing::warn!(
                    "{} search timed out after {}ms for '{}'",
                    source.name(),
                    self.timeout.as_millis(),
                    query
                );
                synthetic_alternatives(query, max_results)
            }
        }
    }
}

/// Title-case each word of a query
pub fn title_case(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A generic search-results link standing in for a real search hit
pub fn synthetic_alternative(query: &str, ordinal: Option<usize>) -> Alternative {
    let title = match ordinal {
        Some(n) => format!("Productive Content {}: {}", n, title_case(query)),
        None => format!("Productive Content: {}", title_case(query)),
    };
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|w| urlencoding::encode(w).into_owned())
        .collect();

    Alternative {
        title,
        url: format!(
            "https://www.youtube.com/results?search_query={}",
            terms.join("+")
        ),
        category: query.to_string(),
        channel: None,
    }
}

pub fn synthetic_alternatives(query: &str, max_results: usize) -> Vec<Alternative> {
    if max_results <= 1 {
        return vec![synthetic_alternative(query, None)];
    }
    (1..=max_results)
        .map(|n| synthetic_alternative(query, Some(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZenfeedError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RecommendationSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Alternative>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ZenfeedError::Search("down".to_string()));
            }
            Ok((0..max_results)
                .map(|i| Alternative {
                    title: format!("{} #{}", query, i),
                    url: format!("https://www.youtube.com/watch?v={}", i),
                    category: query.to_string(),
                    channel: Some("Channel".to_string()),
                })
                .collect())
        }
    }

    fn engine(source: Option<Arc<dyn RecommendationSource>>) -> RecommendationEngine {
        RecommendationEngine::new(
            crate::config::default_category_pool(),
            source,
            RiskTier::Moderate,
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_rotation_no_repeats_until_exhausted() {
        let mut rotation = Rotation::default();
        let picks: Vec<usize> = (0..12).map(|_| rotation.next(12, 5).unwrap()).collect();
        let unique: HashSet<usize> = picks.iter().copied().collect();
        assert_eq!(unique.len(), 12);
        assert_eq!(picks[0], 5);

        // Thirteenth pick starts a new round
        assert!(rotation.next(12, 5).is_some());
        assert!(rotation.next(0, 0).is_none());
    }

    #[test]
    fn test_synthetic_fallback_shape() {
        let alt = synthetic_alternative("python programming tutorial", None);
        assert_eq!(alt.title, "Productive Content: Python Programming Tutorial");
        assert_eq!(
            alt.url,
            "https://www.youtube.com/results?search_query=python+programming+tutorial"
        );
        assert_eq!(synthetic_alternatives("x", 3).len(), 3);
    }

    #[tokio::test]
    async fn test_low_tier_declines() {
        let ctx = PipelineContext::new(Duration::from_secs(60));
        let engine = engine(None);
        assert!(engine.suggest(&ctx, &RiskScore::new(1), 0).await.is_none());
        assert!(engine.suggest(&ctx, &RiskScore::new(2), 0).await.is_some());
        assert_eq!(ctx.stats().snapshot().alternatives_shown, 1);
    }

    #[tokio::test]
    async fn test_search_results_are_cached() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let engine = engine(Some(source.clone() as Arc<dyn RecommendationSource>));
        let ctx = PipelineContext::new(Duration::from_secs(60));

        let first = engine.search(&ctx, "science explained", 2).await;
        let second = engine.search(&ctx, "science explained", 2).await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_search_falls_back_uncached() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let engine = engine(Some(source.clone() as Arc<dyn RecommendationSource>));
        let ctx = PipelineContext::new(Duration::from_secs(60));

        let alt = engine.suggest(&ctx, &RiskScore::new(9), 0).await.unwrap();
        assert!(alt.title.starts_with("Productive Content: "));
        assert!(alt.url.contains("search_query="));
        assert!(ctx.alternatives().is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_suggestions_distinct() {
        let engine = engine(None);
        let ctx = PipelineContext::new(Duration::from_secs(60));
        let mut seen = HashSet::new();
        for _ in 0..12 {
            let alt = engine.suggest(&ctx, &RiskScore::new(8), 3).await.unwrap();
            assert!(seen.insert(alt.category));
        }
    }
}
