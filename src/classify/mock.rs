use super::{Category, Classification, ClassificationSource, Classifier};
use crate::error::{Result, ZenfeedError};
use crate::feed::FeedItem;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock refiner for development and testing
///
/// Without a fixed answer it decides from duration alone: short-form is
/// addictive, long-form educational, everything else neutral.
#[derive(Default)]
pub struct MockClassifier {
    fixed: Option<Category>,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `category`
    pub fn answering(category: Category) -> Self {
        Self {
            fixed: Some(category),
            ..Self::default()
        }
    }

    /// Always fail, like an unreachable service
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of classify calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(&self, item: &FeedItem) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail {
            return Err(ZenfeedError::Llm("mock classifier failure".to_string()));
        }

        let category = self.fixed.unwrap_or(if item.is_short_form() {
            Category::Addictive
        } else if item.is_long_form() {
            Category::Educational
        } else {
            Category::Neutral
        });

        Ok(Classification::new(category, 0.75, ClassificationSource::Mock))
    }
}
