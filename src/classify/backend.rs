// Classifier that delegates to a remote zenfeed server's /analyze endpoint

use super::{Category, Classification, ClassificationSource, Classifier};
use crate::error::{Result, ZenfeedError};
use crate::feed::FeedItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AnalyzeAnswer {
    category: String,
    confidence: f32,
}

pub struct BackendClassifier {
    client: Client,
    analyze_url: String,
}

impl BackendClassifier {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            analyze_url: format!("{}/analyze", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Classifier for BackendClassifier {
    fn name(&self) -> &str {
        "backend"
    }

    async fn classify(&self, item: &FeedItem) -> Result<Classification> {
        let body = json!({
            "title": item.title,
            "durationSeconds": item.duration_seconds,
            "channel": item.channel,
            "platform": item.platform,
            "sourceUrl": item.source_url,
        });

        let response = self.client.post(&self.analyze_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ZenfeedError::Llm(format!(
                "Backend returned {}",
                response.status()
            )));
        }

        let answer: AnalyzeAnswer = response.json().await?;
        let category = Category::from_label(&answer.category).ok_or_else(|| {
            ZenfeedError::Llm(format!("Backend returned unknown category '{}'", answer.category))
        })?;

        Ok(Classification::new(
            category,
            answer.confidence,
            ClassificationSource::Backend,
        ))
    }
}
