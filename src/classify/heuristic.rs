// Keyword heuristic classifier
//
// Each keyword set is compiled once into case-insensitive regexes anchored at
// a word start, so "meme" also matches "memes" but not "ememe".

use super::{Category, Classification, ClassificationSource, Classifier};
use crate::config::KeywordConfig;
use crate::error::{Result, ZenfeedError};
use crate::feed::FeedItem;
use async_trait::async_trait;
use regex::Regex;

const ADDICTIVE_WEIGHT: f32 = 1.0;
const CLICKBAIT_WEIGHT: f32 = 0.5;
const EDUCATIONAL_WEIGHT: f32 = 1.0;
/// Subtracted from the addictive bucket per educational hit
const EDUCATIONAL_DAMPING: f32 = 0.5;
const ENTERTAINMENT_WEIGHT: f32 = 1.0;

const TIE_CONFIDENCE: f32 = 0.6;

/// A named list of compiled keyword patterns
#[derive(Debug, Clone)]
pub struct KeywordSet {
    name: String,
    patterns: Vec<(String, Regex)>,
}

impl KeywordSet {
    pub fn compile(name: &str, keywords: &[String]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                continue;
            }

            let escaped = regex::escape(keyword);
            let starts_with_word = keyword
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false);
            let pattern = if starts_with_word {
                format!(r"(?i)\b{}", escaped)
            } else {
                format!("(?i){}", escaped)
            };

            let regex = Regex::new(&pattern).map_err(|e| ZenfeedError::InvalidConfigValue {
                path: format!("classifier.keywords.{}", name),
                message: format!("Invalid keyword '{}': {}", keyword, e),
            })?;
            patterns.push((keyword.to_string(), regex));
        }

        Ok(Self {
            name: name.to_string(),
            patterns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Keywords of this set found in `text`
    pub fn matches<'a>(&'a self, text: &str) -> Vec<&'a str> {
        self.patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(keyword, _)| keyword.as_str())
            .collect()
    }
}

/// Result of a heuristic pass, with what the tiered classifier needs to
/// decide whether to consult a refiner
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicOutcome {
    pub classification: Classification,
    /// (top - second) / max(top, 1), in [0, 1]
    pub separation: f32,
    pub ambiguous: bool,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    explicit: KeywordSet,
    addictive: KeywordSet,
    clickbait: KeywordSet,
    entertainment: KeywordSet,
    educational: KeywordSet,
    ambiguity_margin: f32,
}

impl HeuristicClassifier {
    pub fn new(keywords: &KeywordConfig, ambiguity_margin: f32) -> Result<Self> {
        Ok(Self {
            explicit: KeywordSet::compile("explicit", &keywords.explicit)?,
            addictive: KeywordSet::compile("addictive", &keywords.addictive)?,
            clickbait: KeywordSet::compile("clickbait", &keywords.clickbait)?,
            entertainment: KeywordSet::compile("entertainment", &keywords.entertainment)?,
            educational: KeywordSet::compile("educational", &keywords.educational)?,
            ambiguity_margin,
        })
    }

    /// Classify the item's title and channel
    pub fn evaluate(&self, item: &FeedItem) -> HeuristicOutcome {
        let text = format!("{} {}", item.title, item.channel);

        let explicit = self.explicit.matches(&text);
        if !explicit.is_empty() {
            return HeuristicOutcome {
                classification: Classification::new(
                    Category::Explicit,
                    1.0,
                    ClassificationSource::Heuristic,
                ),
                separation: 1.0,
                ambiguous: false,
                matched: explicit.iter().map(|k| k.to_string()).collect(),
            };
        }

        let addictive = self.addictive.matches(&text);
        let clickbait = self.clickbait.matches(&text);
        let entertainment = self.entertainment.matches(&text);
        let educational = self.educational.matches(&text);

        let educational_score = educational.len() as f32 * EDUCATIONAL_WEIGHT;
        let addictive_score = (addictive.len() as f32 * ADDICTIVE_WEIGHT
            + clickbait.len() as f32 * CLICKBAIT_WEIGHT
            - educational.len() as f32 * EDUCATIONAL_DAMPING)
            .max(0.0);
        let entertainment_score = entertainment.len() as f32 * ENTERTAINMENT_WEIGHT;

        let matched: Vec<String> = addictive
            .iter()
            .chain(&clickbait)
            .chain(&entertainment)
            .chain(&educational)
            .map(|k| k.to_string())
            .collect();

        let mut buckets = [
            (Category::Addictive, addictive_score),
            (Category::Entertainment, entertainment_score),
            (Category::Educational, educational_score),
        ];
        buckets.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (top_category, top) = buckets[0];
        let second = buckets[1].1;
        let separation = ((top - second) / top.max(1.0)).clamp(0.0, 1.0);

        let classification = if top <= 0.0 || top == second {
            Classification::new(Category::Neutral, TIE_CONFIDENCE, ClassificationSource::Heuristic)
        } else {
            Classification::new(
                top_category,
                0.55 + 0.4 * separation,
                ClassificationSource::Heuristic,
            )
        };

        let ambiguous = matched.is_empty() || separation < self.ambiguity_margin;

        tracing::debug!(
            "Heuristic {:?} for '{}' (separation {:.2}, ambiguous {})",
            classification.category,
            item.title,
            separation,
            ambiguous
        );

        HeuristicOutcome {
            classification,
            separation,
            ambiguous,
            matched,
        }
    }
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, item: &FeedItem) -> Result<Classification> {
        Ok(self.evaluate(item).classification)
    }
}
