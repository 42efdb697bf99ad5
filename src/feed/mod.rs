//! Feed item model
//!
//! A [`RawFeedItem`] is the loose field bag a feed source hands us; the
//! normalizer turns it into an immutable [`FeedItem`] or rejects it.

mod normalizer;

pub use normalizer::{normalize, parse_duration_text, Rejection, LONG_FORM_SENTINEL_SECS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a feed item, derived from its source
pub type ItemId = String;

/// Platform the item was scraped from
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    #[default]
    YouTube,
    Instagram,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Other(name) => name,
        }
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "youtube" | "yt" => Platform::YouTube,
            "instagram" | "ig" => Platform::Instagram,
            other => Platform::Other(other.to_string()),
        }
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        Platform::from(value.as_str())
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated fields extracted from one visible feed entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFeedItem {
    pub title: Option<String>,
    /// Display text such as "12:34" or "1:02:03"
    pub duration_text: Option<String>,
    /// Numeric duration; wins over `duration_text` when present
    #[serde(alias = "duration_sec")]
    pub duration_seconds: Option<f64>,
    pub channel: Option<String>,
    #[serde(alias = "url")]
    pub source_url: Option<String>,
    pub platform: Option<String>,
}

impl RawFeedItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_duration_text(mut self, text: impl Into<String>) -> Self {
        self.duration_text = Some(text.into());
        self
    }

    pub fn with_duration_seconds(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// A validated feed item. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: ItemId,
    pub title: String,
    pub duration_seconds: u64,
    pub channel: String,
    pub source_url: String,
    pub platform: Platform,
}

impl FeedItem {
    pub fn is_short_form(&self) -> bool {
        self.duration_seconds < 60
    }

    pub fn is_long_form(&self) -> bool {
        self.duration_seconds > 1200
    }

    /// Hash of the title, used with the id as the classification cache key
    pub fn title_hash(&self) -> String {
        blake3::hash(self.title.as_bytes()).to_hex()[..16].to_string()
    }
}

/// Derive a stable item id from the source URL, or from the item's
/// descriptive fields when no URL is known
pub fn derive_item_id(source_url: &str, platform: &Platform, channel: &str, title: &str) -> ItemId {
    let mut hasher = blake3::Hasher::new();
    if source_url.is_empty() {
        hasher.update(platform.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(channel.as_bytes());
        hasher.update(b"\0");
        hasher.update(title.as_bytes());
    } else {
        hasher.update(source_url.as_bytes());
    }
    hasher.finalize().to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!(Platform::from("YouTube"), Platform::YouTube);
        assert_eq!(Platform::from(""), Platform::YouTube);
        assert_eq!(Platform::from(" instagram "), Platform::Instagram);
        assert_eq!(
            Platform::from("TikTok"),
            Platform::Other("tiktok".to_string())
        );
    }

    #[test]
    fn test_platform_serde() {
        let json = serde_json::to_string(&Platform::Instagram).unwrap();
        assert_eq!(json, "\"instagram\"");
        let parsed: Platform = serde_json::from_str("\"youtube\"").unwrap();
        assert_eq!(parsed, Platform::YouTube);
    }

    #[test]
    fn test_item_id_stable() {
        let a = derive_item_id("https://youtu.be/abc", &Platform::YouTube, "x", "y");
        let b = derive_item_id("https://youtu.be/abc", &Platform::Instagram, "z", "w");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let c = derive_item_id("", &Platform::YouTube, "chan", "title");
        let d = derive_item_id("", &Platform::YouTube, "chan", "title");
        let e = derive_item_id("", &Platform::YouTube, "chan", "other title");
        assert_eq!(c, d);
        assert_ne!(c, e);
    }

    #[test]
    fn test_raw_item_accepts_aliases() {
        let raw: RawFeedItem = serde_json::from_str(
            r#"{"title": "A", "duration_sec": 45, "url": "https://x"}"#,
        )
        .unwrap();
        assert_eq!(raw.duration_seconds, Some(45.0));
        assert_eq!(raw.source_url.as_deref(), Some("https://x"));
    }
}
