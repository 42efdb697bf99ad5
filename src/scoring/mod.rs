//! Risk scoring
//!
//! Maps an item and its classification to a 0..=10 risk value and a tier.
//! Scoring is pure: no IO, no clock, no randomness.

use crate::classify::{Category, Classification};
use crate::feed::FeedItem;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_RISK: u8 = 10;

const SHORT_FORM_MAX_SECS: u64 = 60;
const LONG_FORM_MIN_SECS: u64 = 1200;
const SHORT_FORM_PENALTY: i32 = 8;
const LONG_FORM_CREDIT: i32 = -2;

/// Coarse bucket of a risk value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    /// 0-1 Low, 2-4 Moderate, 5-7 High, 8-10 Critical
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=1 => RiskTier::Low,
            2..=4 => RiskTier::Moderate,
            5..=7 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub value: u8,
    pub tier: RiskTier,
}

impl RiskScore {
    pub fn new(value: u8) -> Self {
        let value = value.min(MAX_RISK);
        Self {
            value,
            tier: RiskTier::from_value(value),
        }
    }

    pub fn is_at_least(&self, tier: RiskTier) -> bool {
        self.tier >= tier
    }
}

/// How a score was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub category: Category,
    /// Explicit content bypasses the weighted sum
    pub explicit_override: bool,
    pub base: i32,
    pub duration_adjustment: i32,
    /// Sum before clamping
    pub raw: i32,
    pub score: RiskScore,
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit_override {
            return write!(f, "explicit content => {} ({})", self.score.value, self.score.tier);
        }
        write!(
            f,
            "{} base {:+}, duration {:+}, raw {} => {} ({})",
            self.category,
            self.base,
            self.duration_adjustment,
            self.raw,
            self.score.value,
            self.score.tier
        )
    }
}

pub trait RiskScorer: Send + Sync {
    fn score(&self, item: &FeedItem, classification: &Classification) -> RiskScore;
}

/// Category weight plus a duration adjustment, clamped to 0..=10
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRiskScorer;

impl WeightedRiskScorer {
    pub fn new() -> Self {
        Self
    }

    fn category_weight(category: Category) -> i32 {
        match category {
            Category::Addictive => 5,
            Category::Entertainment => 3,
            Category::Neutral => 0,
            Category::Educational => -5,
            Category::Explicit => MAX_RISK as i32,
        }
    }

    fn duration_adjustment(duration_seconds: u64) -> i32 {
        if duration_seconds < SHORT_FORM_MAX_SECS {
            SHORT_FORM_PENALTY
        } else if duration_seconds > LONG_FORM_MIN_SECS {
            LONG_FORM_CREDIT
        } else {
            0
        }
    }

    /// Full breakdown of the score for display and logs
    pub fn explain(&self, item: &FeedItem, classification: &Classification) -> ScoreBreakdown {
        let category = classification.category;

        if category == Category::Explicit {
            return ScoreBreakdown {
                category,
                explicit_override: true,
                base: MAX_RISK as i32,
                duration_adjustment: 0,
                raw: MAX_RISK as i32,
                score: RiskScore::new(MAX_RISK),
            };
        }

        let base = Self::category_weight(category);
        let duration_adjustment = Self::duration_adjustment(item.duration_seconds);
        let raw = base + duration_adjustment;
        let clamped = raw.clamp(0, MAX_RISK as i32) as u8;

        ScoreBreakdown {
            category,
            explicit_override: false,
            base,
            duration_adjustment,
            raw,
            score: RiskScore::new(clamped),
        }
    }
}

impl RiskScorer for WeightedRiskScorer {
    fn score(&self, item: &FeedItem, classification: &Classification) -> RiskScore {
        self.explain(item, classification).score
    }
}
