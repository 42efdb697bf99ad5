//! Content classification
//!
//! A fast keyword heuristic is always available. When its answer is
//! ambiguous a slower refiner (LLM, remote backend or mock) may be consulted;
//! see [`TieredClassifier`].

mod backend;
mod heuristic;
mod llm;
mod mock;
mod tiered;

pub use backend::BackendClassifier;
pub use heuristic::{HeuristicClassifier, HeuristicOutcome, KeywordSet};
pub use llm::{parse_verdict, LlmClassifier};
pub use mock::MockClassifier;
pub use tiered::{refine_with_timeout, TieredClassifier};

use crate::config::Config;
use crate::error::Result;
use crate::feed::FeedItem;
use crate::store::{ClientStore, StoreKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Content category, ordered from least to most concerning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Educational,
    Neutral,
    Entertainment,
    Addictive,
    Explicit,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Educational => "educational",
            Category::Neutral => "neutral",
            Category::Entertainment => "entertainment",
            Category::Addictive => "addictive",
            Category::Explicit => "explicit",
        }
    }

    /// Map a label from a classification service onto a category.
    /// "productive" folds into Educational and "harmful" into Explicit.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "educational" | "productive" => Some(Category::Educational),
            "neutral" => Some(Category::Neutral),
            "entertainment" => Some(Category::Entertainment),
            "addictive" => Some(Category::Addictive),
            "explicit" | "harmful" => Some(Category::Explicit),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which classifier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Heuristic,
    Llm,
    Backend,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// Always within [0, 1]
    pub confidence: f32,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn new(category: Category, confidence: f32, source: ClassificationSource) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            category,
            confidence,
            source,
        }
    }
}

/// A classification stage
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, item: &FeedItem) -> Result<Classification>;
}

/// Pick the refiner consulted for ambiguous items.
///
/// A backend enabled in the client store wins over the configured LLM.
/// Returns `None` when no refiner is configured or it cannot be built.
pub fn build_refiner(config: &Config, store: &dyn ClientStore) -> Option<Arc<dyn Classifier>> {
    let backend_enabled = match store.get_bool(StoreKey::EnableBackend) {
        Ok(flag) => flag.unwrap_or(false),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", StoreKey::EnableBackend, e);
            false
        }
    };

    if backend_enabled {
        match store.get_string(StoreKey::BackendUrl) {
            Ok(Some(url)) if !url.trim().is_empty() => {
                match BackendClassifier::new(url.trim(), config.llm_timeout().ok()) {
                    Ok(backend) => {
                        tracing::info!("Using remote backend classifier at {}", url.trim());
                        return Some(Arc::new(backend));
                    }
                    Err(e) => tracing::warn!("Backend classifier unavailable: {}", e),
                }
            }
            Ok(_) => tracing::warn!("Backend enabled but no {} set", StoreKey::BackendUrl),
            Err(e) => tracing::warn!("Failed to read {}: {}", StoreKey::BackendUrl, e),
        }
    }

    if !config.llm.enabled {
        return None;
    }

    if config.llm.provider == "mock" {
        tracing::info!("Using mock LLM classifier");
        return Some(Arc::new(MockClassifier::new()));
    }

    match LlmClassifier::from_config(&config.llm) {
        Ok(llm) => {
            tracing::info!(
                "Using LLM classifier {} ({})",
                config.llm.provider,
                config.llm.model
            );
            Some(Arc::new(llm))
        }
        Err(e) => {
            tracing::warn!("LLM classifier disabled: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_label_mapping() {
        assert_eq!(Category::from_label("productive"), Some(Category::Educational));
        assert_eq!(Category::from_label("Harmful"), Some(Category::Explicit));
        assert_eq!(Category::from_label(" addictive "), Some(Category::Addictive));
        assert_eq!(Category::from_label("spam"), None);
    }

    #[test]
    fn test_confidence_clamped() {
        let c = Classification::new(Category::Neutral, 1.7, ClassificationSource::Llm);
        assert_eq!(c.confidence, 1.0);
        let c = Classification::new(Category::Neutral, f32::NAN, ClassificationSource::Llm);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_no_refiner_by_default() {
        let config = Config::default();
        let store = MemoryStore::new();
        assert!(build_refiner(&config, &store).is_none());
    }

    #[test]
    fn test_mock_refiner() {
        let mut config = Config::default();
        config.llm.enabled = true;
        config.llm.provider = "mock".to_string();
        let store = MemoryStore::new();

        let refiner = build_refiner(&config, &store).unwrap();
        assert_eq!(refiner.name(), "mock");
    }

    #[test]
    fn test_backend_refiner_from_store() {
        let config = Config::default();
        let store = MemoryStore::new();
        store.set(StoreKey::EnableBackend, json!(true)).unwrap();
        store
            .set(StoreKey::BackendUrl, json!("http://127.0.0.1:8000"))
            .unwrap();

        let refiner = build_refiner(&config, &store).unwrap();
        assert_eq!(refiner.name(), "backend");
    }

    #[test]
    fn test_unavailable_store_falls_back() {
        let config = Config::default();
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(build_refiner(&config, &store).is_none());
    }
}
