use crate::config::{parse_duration, Config};
use crate::error::{Result, ValidationError, ZenfeedError};
use std::collections::HashSet;
use std::net::SocketAddr;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every failure
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_durations(config, &mut errors);
        Self::validate_history(config, &mut errors);
        Self::validate_classifier(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_scoring(config, &mut errors);
        Self::validate_recommendation(config, &mut errors);
        Self::validate_server(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ZenfeedError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_durations(config: &Config, errors: &mut Vec<ValidationError>) {
        let durations = [
            ("scan.interval", &config.scan.interval),
            ("scan.sweep_interval", &config.scan.sweep_interval),
            ("learning.duration", &config.learning.duration),
            ("learning.validity", &config.learning.validity),
            ("llm.timeout", &config.llm.timeout),
            ("recommendation.cache_ttl", &config.recommendation.cache_ttl),
            ("recommendation.timeout", &config.recommendation.timeout),
        ];

        for (path, value) in durations {
            match parse_duration(value) {
                Ok(d) if d.is_zero() => {
                    errors.push(ValidationError::new(path, "Duration must be greater than 0"));
                }
                Ok(_) => {}
                Err(_) => {
                    errors.push(ValidationError::new(
                        path,
                        format!("Invalid duration format: {}", value),
                    ));
                }
            }
        }
    }

    fn validate_history(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.history.capacity == 0 {
            errors.push(ValidationError::new(
                "history.capacity",
                "History capacity must be greater than 0",
            ));
        }
    }

    fn validate_classifier(config: &Config, errors: &mut Vec<ValidationError>) {
        let margin = config.classifier.ambiguity_margin;
        if !(0.0..=1.0).contains(&margin) {
            errors.push(ValidationError::new(
                "classifier.ambiguity_margin",
                format!("Ambiguity margin must be between 0.0 and 1.0, got {}", margin),
            ));
        }

        if config.classifier.keywords.explicit.is_empty() {
            errors.push(ValidationError::new(
                "classifier.keywords.explicit",
                "Explicit keyword set cannot be empty",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.llm.provider;
        let valid_providers = ["openai", "groq", "ollama", "mock"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.enabled && provider != "mock" && config.llm.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "llm.endpoint",
                "Endpoint cannot be empty when the LLM is enabled",
            ));
        }
    }

    fn validate_scoring(config: &Config, errors: &mut Vec<ValidationError>) {
        let threshold = config.scoring.block_threshold;
        if threshold > 10 {
            errors.push(ValidationError::new(
                "scoring.block_threshold",
                format!("Block threshold must be between 0 and 10, got {}", threshold),
            ));
        }
    }

    fn validate_recommendation(config: &Config, errors: &mut Vec<ValidationError>) {
        let pool = &config.recommendation.pool;
        if pool.is_empty() {
            errors.push(ValidationError::new(
                "recommendation.pool",
                "Category pool cannot be empty",
            ));
        }

        if pool.iter().any(|q| q.trim().is_empty()) {
            errors.push(ValidationError::new(
                "recommendation.pool",
                "Category pool entries cannot be blank",
            ));
        }

        let mut seen = HashSet::new();
        for query in pool {
            let key = query.trim().to_lowercase();
            if !key.is_empty() && !seen.insert(key) {
                errors.push(ValidationError::new(
                    "recommendation.pool",
                    format!("Duplicate category in pool: '{}'", query.trim()),
                ));
            }
        }

        if config.search.enabled && config.search.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "search.endpoint",
                "Endpoint cannot be empty when search is enabled",
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.bind",
                format!("Invalid bind address: {}", config.server.bind),
            ));
        }
    }
}
