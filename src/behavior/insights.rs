// Long-run viewing patterns derived from the watch history

use super::WatchHistory;
use crate::classify::Category;
use chrono::{Local, TimeZone, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

const RISING_FACTOR: f32 = 1.25;
const FALLING_FACTOR: f32 = 0.75;
const ADDICTIVE_SHARE_WARNING: f32 = 0.6;
const LATE_NIGHT_WARNING: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_items: usize,
    pub category_counts: BTreeMap<String, usize>,
    /// Share of addictive or explicit items, in [0, 1]
    pub addictive_share: f32,
    pub late_night_items: usize,
    pub trend: Trend,
    pub early_warning: bool,
    pub notes: Vec<String>,
}

impl Insights {
    pub fn from_history(history: &WatchHistory) -> Self {
        let mut category_counts = BTreeMap::new();
        let mut weights = Vec::with_capacity(history.len());
        let mut late_night_items = 0;

        for entry in history.iter() {
            *category_counts
                .entry(entry.detected_category.as_str().to_string())
                .or_insert(0) += 1;
            weights.push(engagement_weight(entry.detected_category));
            if is_late_night(entry.timestamp) {
                late_night_items += 1;
            }
        }

        let total_items = history.len();
        let risky = weights.iter().filter(|w| **w >= 1.0).count();
        let addictive_share = if total_items == 0 {
            0.0
        } else {
            risky as f32 / total_items as f32
        };

        let trend = detect_trend(&weights);
        let early_warning = addictive_share > ADDICTIVE_SHARE_WARNING
            || late_night_items > LATE_NIGHT_WARNING
            || trend == Trend::Increasing;

        let mut notes = Vec::new();
        if late_night_items > LATE_NIGHT_WARNING {
            notes.push(format!(
                "Late-night viewing detected ({} items after 11 PM)",
                late_night_items
            ));
        }
        if addictive_share > ADDICTIVE_SHARE_WARNING {
            notes.push(format!(
                "Addictive content makes up {:.0}% of recent viewing",
                addictive_share * 100.0
            ));
        }
        if trend == Trend::Increasing {
            notes.push("Addictive viewing is trending up".to_string());
        }
        if total_items > 0 && category_counts.get("educational").copied().unwrap_or(0) < 2 {
            notes.push("Low engagement with educational content".to_string());
        }
        if notes.is_empty() {
            notes.push("No concerning patterns detected".to_string());
        }

        Self {
            total_items,
            category_counts,
            addictive_share,
            late_night_items,
            trend,
            early_warning,
            notes,
        }
    }
}

fn engagement_weight(category: Category) -> f32 {
    match category {
        Category::Addictive | Category::Explicit => 1.0,
        Category::Entertainment => 0.5,
        Category::Neutral | Category::Educational => 0.0,
    }
}

fn is_late_night(timestamp_ms: i64) -> bool {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(at) => at.hour() >= 23 || at.hour() < 6,
        None => false,
    }
}

/// Compare the most recent window against everything before it
pub fn detect_trend(weights: &[f32]) -> Trend {
    if weights.len() < 3 {
        return Trend::Stable;
    }

    let window = if weights.len() >= 5 { 5 } else { 3 };
    let (older, recent) = weights.split_at(weights.len() - window);
    if older.is_empty() {
        return Trend::Stable;
    }

    let recent_avg = recent.iter().sum::<f32>() / recent.len() as f32;
    let older_avg = older.iter().sum::<f32>() / older.len() as f32;

    if recent_avg > older_avg * RISING_FACTOR {
        Trend::Increasing
    } else if recent_avg < older_avg * FALLING_FACTOR {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::WatchHistoryEntry;
    use crate::store::MemoryStore;

    #[test]
    fn test_trend_detection() {
        assert_eq!(detect_trend(&[1.0, 1.0]), Trend::Stable);
        assert_eq!(detect_trend(&[0.0, 1.0, 1.0]), Trend::Stable);
        assert_eq!(
            detect_trend(&[0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0]),
            Trend::Increasing
        );
        assert_eq!(
            detect_trend(&[1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Trend::Decreasing
        );
        assert_eq!(detect_trend(&[0.5, 0.5, 0.5, 0.5, 0.5, 0.5]), Trend::Stable);
    }

    #[test]
    fn test_insights_from_history() {
        let store = MemoryStore::new();
        let mut history = WatchHistory::new(100);
        let categories = [
            Category::Educational,
            Category::Educational,
            Category::Neutral,
            Category::Addictive,
            Category::Addictive,
            Category::Addictive,
            Category::Addictive,
            Category::Addictive,
        ];
        // noon UTC on 2024-01-01, an hour apart
        let base = 1_704_110_400_000i64;
        for (i, category) in categories.iter().enumerate() {
            history.append(
                WatchHistoryEntry {
                    title: format!("v{}", i),
                    detected_category: *category,
                    timestamp: base + i as i64 * 60_000,
                },
                &store,
            );
        }

        let insights = Insights::from_history(&history);
        assert_eq!(insights.total_items, 8);
        assert_eq!(insights.category_counts["addictive"], 5);
        assert!((insights.addictive_share - 0.625).abs() < 1e-6);
        assert_eq!(insights.trend, Trend::Increasing);
        assert!(insights.early_warning);
    }

    #[test]
    fn test_empty_history() {
        let insights = Insights::from_history(&WatchHistory::new(10));
        assert_eq!(insights.total_items, 0);
        assert_eq!(insights.trend, Trend::Stable);
        assert_eq!(insights.notes, vec!["No concerning patterns detected".to_string()]);
    }
}
