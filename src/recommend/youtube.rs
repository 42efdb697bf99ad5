// YouTube Data API v3 search.list

use super::{Alternative, RecommendationSource};
use crate::config::SearchConfig;
use crate::error::{Result, ZenfeedError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    channel_title: Option<String>,
}

pub struct YouTubeSearchSource {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl YouTubeSearchSource {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ZenfeedError::Config(format!("{} is not set", config.api_key_env)))?;

        Ok(Self::new(config.endpoint.clone(), api_key))
    }
}

#[async_trait]
impl RecommendationSource for YouTubeSearchSource {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Alternative>> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("safeSearch", "moderate"),
                ("relevanceLanguage", "en"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ZenfeedError::Search(format!(
                "YouTube API returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        let alternatives: Vec<Alternative> = body
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(Alternative {
                    title: item.snippet.title,
                    url: format!("https://www.youtube.com/watch?v={}", video_id),
                    category: query.to_string(),
                    channel: item.snippet.channel_title,
                })
            })
            .collect();

        tracing::debug!("YouTube returned {} results for '{}'", alternatives.len(), query);
        Ok(alternatives)
    }
}
