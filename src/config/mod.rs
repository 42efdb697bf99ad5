//! Configuration management for zenfeed
//!
//! Loads the TOML configuration, applies environment overrides and runs the
//! validator so that a malformed configuration fails at startup rather than
//! per item.

use crate::error::{Result, ZenfeedError};
use crate::scoring::RiskTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub scan: ScanConfig,
    pub learning: LearningConfig,
    pub history: HistoryConfig,
    pub classifier: ClassifierConfig,
    pub llm: LlmConfig,
    pub scoring: ScoringConfig,
    pub recommendation: RecommendationConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where the client store lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Feed scan loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub interval: String,
    pub sweep_interval: String,
}

/// Learning period timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    pub duration: String,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub capacity: usize,
}

/// Heuristic classifier tuning and keyword sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Relative separation between the top two buckets below which the
    /// heuristic result is considered ambiguous
    pub ambiguity_margin: f32,
    #[serde(default)]
    pub keywords: KeywordConfig,
}

/// Keyword sets used by the heuristic classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub explicit: Vec<String>,
    pub addictive: Vec<String>,
    pub clickbait: Vec<String>,
    pub entertainment: Vec<String>,
    pub educational: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        fn owned(words: &[&str]) -> Vec<String> {
            words.iter().map(|w| w.to_string()).collect()
        }

        Self {
            explicit: owned(&[
                "nsfw", "porn", "xxx", "nude", "nudity", "onlyfans", "sexy", "18+", "explicit",
                "uncensored", "hentai",
            ]),
            addictive: owned(&[
                "shorts", "meme", "try not to laugh", "compilation", "reaction",
                "reacts", "viral", "challenge", "tiktok", "fails", "funny", "best of", "prank",
                "asmr", "satisfying",
            ]),
            clickbait: owned(&[
                "you won't believe", "shocking", "must see", "gone wrong", "insane", "crazy",
                "unbelievable", "watch till the end", "omg",
            ]),
            entertainment: owned(&[
                "vlog", "music video", "trailer", "gameplay", "gaming", "stream", "highlights",
                "comedy", "movie", "song", "live",
            ]),
            educational: owned(&[
                "tutorial", "learn", "course", "lecture", "study", "explained", "documentary",
                "how to", "guide", "beginners", "introduction", "science", "math", "programming",
                "python", "productivity", "lesson",
            ]),
        }
    }
}

/// LLM-backed classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key_env: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Risk value at or above which an intervention is considered
    pub block_threshold: u8,
}

/// Recommendation engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub min_tier: RiskTier,
    pub cache_ttl: String,
    pub timeout: String,
    pub pool: Vec<String>,
}

/// External video search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key_env: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ZenfeedError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ZenfeedError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ZenfeedError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: ZENFEED_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("ZENFEED_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__ENABLED" => {
                self.llm.enabled = parse_env_value(path, value)?;
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__PROVIDER" => {
                self.llm.provider = value.to_string();
            }
            "SEARCH__ENABLED" => {
                self.search.enabled = parse_env_value(path, value)?;
            }
            "SCORING__BLOCK_THRESHOLD" => {
                self.scoring.block_threshold = parse_env_value(path, value)?;
            }
            "SERVER__BIND" => {
                self.server.bind = value.to_string();
            }
            "LEARNING__DURATION" => {
                self.learning.duration = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ZenfeedError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("zenfeed").join("config.toml"))
    }

    /// Data directory with a leading `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn scan_interval(&self) -> Result<Duration> {
        parse_duration(&self.scan.interval)
    }

    pub fn sweep_interval(&self) -> Result<Duration> {
        parse_duration(&self.scan.sweep_interval)
    }

    pub fn learning_duration(&self) -> Result<Duration> {
        parse_duration(&self.learning.duration)
    }

    pub fn learning_validity(&self) -> Result<Duration> {
        parse_duration(&self.learning.validity)
    }

    pub fn llm_timeout(&self) -> Result<Duration> {
        parse_duration(&self.llm.timeout)
    }

    pub fn recommendation_ttl(&self) -> Result<Duration> {
        parse_duration(&self.recommendation.cache_ttl)
    }

    pub fn recommendation_timeout(&self) -> Result<Duration> {
        parse_duration(&self.recommendation.timeout)
    }
}

/// Expand tilde in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn parse_env_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ZenfeedError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Parse a duration string such as "500ms", "2s", "5m" or "24h".
/// A bare number is read as seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || ZenfeedError::InvalidConfigValue {
        path: "duration".to_string(),
        message: format!("Invalid duration: '{}'", value),
    };

    // "ms" must be checked before "s"
    let (number, unit_secs): (&str, Option<u64>) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, None)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, Some(1))
    } else if let Some(m) = value.strip_suffix('m') {
        (m, Some(60))
    } else if let Some(h) = value.strip_suffix('h') {
        (h, Some(3600))
    } else {
        (value, Some(1))
    };

    let amount: u64 = number.trim().parse().map_err(|_| invalid())?;
    Ok(match unit_secs {
        None => Duration::from_millis(amount),
        Some(multiplier) => Duration::from_secs(amount * multiplier),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.zenfeed"),
            },
            scan: ScanConfig {
                interval: "2s".to_string(),
                sweep_interval: "60s".to_string(),
            },
            learning: LearningConfig {
                duration: "180s".to_string(),
                validity: "24h".to_string(),
            },
            history: HistoryConfig { capacity: 100 },
            classifier: ClassifierConfig {
                ambiguity_margin: 0.34,
                keywords: KeywordConfig::default(),
            },
            llm: LlmConfig {
                enabled: false,
                provider: "openai".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
                timeout: "4s".to_string(),
            },
            scoring: ScoringConfig { block_threshold: 2 },
            recommendation: RecommendationConfig {
                min_tier: RiskTier::Moderate,
                cache_ttl: "5m".to_string(),
                timeout: "3s".to_string(),
                pool: default_category_pool(),
            },
            search: SearchConfig {
                enabled: false,
                api_key_env: "YOUTUBE_API_KEY".to_string(),
                endpoint: "https://www.googleapis.com/youtube/v3/search".to_string(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
            },
        }
    }
}

/// Productive-topic queries the recommendation engine rotates through
pub fn default_category_pool() -> Vec<String> {
    [
        "python programming tutorial for beginners",
        "productivity tips for students",
        "5 minute meditation for focus",
        "study with me pomodoro",
        "quick desk exercises",
        "science explained",
        "history documentary",
        "learn a new language",
        "personal finance basics",
        "healthy cooking recipes",
        "creative writing tips",
        "math problem solving",
    ]
    .iter()
    .map(|q| q.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.scoring.block_threshold = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.scoring.block_threshold, 4);
        assert_eq!(loaded.recommendation.pool.len(), 12);
        assert_eq!(loaded.recommendation.min_tier, RiskTier::Moderate);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(&temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ZenfeedError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("/tmp/zenfeed"));
        assert_eq!(expanded, PathBuf::from("/tmp/zenfeed"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/.zenfeed")), home.join(".zenfeed"));
        }
    }

    #[test]
    fn test_default_durations() {
        let config = Config::default();
        assert_eq!(config.scan_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(config.sweep_interval().unwrap(), Duration::from_secs(60));
        assert_eq!(config.learning_duration().unwrap(), Duration::from_secs(180));
        assert_eq!(config.learning_validity().unwrap(), Duration::from_secs(86_400));
        assert_eq!(config.recommendation_ttl().unwrap(), Duration::from_secs(300));
    }
}
