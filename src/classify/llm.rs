// LLM-backed classifier speaking the OpenAI-compatible chat completions API

use super::{Category, Classification, ClassificationSource, Classifier};
use crate::config::{parse_duration, LlmConfig};
use crate::error::{Result, ZenfeedError};
use crate::feed::FeedItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You classify video feed items by their likely effect on the \
viewer's wellbeing and focus. Answer with a single JSON object and nothing else: \
{\"category\": one of [\"educational\", \"productive\", \"neutral\", \"entertainment\", \
\"addictive\", \"harmful\"], \"confidence\": number between 0 and 1}. \
Short compilations, memes, reactions and clickbait are addictive. Tutorials, lectures and \
documentaries are educational.";

/// Parsed model answer
#[derive(Debug, Deserialize)]
struct Verdict {
    category: String,
    #[serde(default)]
    confidence: Option<f32>,
}

pub struct LlmClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl LlmClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            temperature,
        }
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable. Local providers may run without a key.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() && config.provider != "ollama" {
            return Err(ZenfeedError::Config(format!(
                "{} is not set for provider {}",
                config.api_key_env, config.provider
            )));
        }

        let timeout = parse_duration(&config.timeout)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn user_prompt(item: &FeedItem) -> String {
        format!(
            "Title: \"{}\"\nChannel: \"{}\"\nDuration: {} seconds\nPlatform: {}",
            item.title, item.channel, item.duration_seconds, item.platform
        )
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(&self, item: &FeedItem) -> Result<Classification> {
        let start = Instant::now();

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::user_prompt(item) },
            ],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ZenfeedError::Llm(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let raw: Value = response.json().await?;
        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ZenfeedError::Llm("No content in response".to_string()))?;

        let classification = parse_verdict(content)?;
        debug!(
            "LLM classified '{}' as {} in {}ms",
            item.title,
            classification.category,
            start.elapsed().as_millis()
        );
        Ok(classification)
    }
}

/// Parse a model answer, tolerating code fences and chatter around the JSON
pub fn parse_verdict(content: &str) -> Result<Classification> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json_text = match (start, end) {
        (Some(s), Some(e)) if e > s => &content[s..=e],
        _ => {
            return Err(ZenfeedError::Llm(format!(
                "No JSON object in answer: {}",
                content.chars().take(80).collect::<String>()
            )))
        }
    };

    let verdict: Verdict = serde_json::from_str(json_text).map_err(|e| ZenfeedError::Json {
        source: e,
        context: "Failed to parse LLM verdict".to_string(),
    })?;

    let category = Category::from_label(&verdict.category).ok_or_else(|| {
        ZenfeedError::Llm(format!("Unknown category '{}'", verdict.category))
    })?;

    Ok(Classification::new(
        category,
        verdict.confidence.unwrap_or(0.7),
        ClassificationSource::Llm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let c = parse_verdict(r#"{"category": "addictive", "confidence": 0.92}"#).unwrap();
        assert_eq!(c.category, Category::Addictive);
        assert!((c.confidence - 0.92).abs() < 1e-6);
        assert_eq!(c.source, ClassificationSource::Llm);
    }

    #[test]
    fn test_parse_fenced_json() {
        let answer = "```json\n{\"category\": \"productive\", \"reason\": \"x\"}\n```";
        let c = parse_verdict(answer).unwrap();
        assert_eq!(c.category, Category::Educational);
        assert!((c.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_verdict("I think it's fine").is_err());
        assert!(parse_verdict(r#"{"category": "spam"}"#).is_err());
        assert!(parse_verdict(r#"{"confidence": 0.4}"#).is_err());
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig {
            enabled: true,
            provider: "openai".to_string(),
            api_key_env: "ZENFEED_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: "m".to_string(),
            temperature: 0.3,
            timeout: "1s".to_string(),
        };
        assert!(LlmClassifier::from_config(&config).is_err());

        let local = LlmConfig {
            provider: "ollama".to_string(),
            ..config
        };
        assert!(LlmClassifier::from_config(&local).is_ok());
    }
}
