use super::{derive_item_id, FeedItem, Platform, RawFeedItem};
use thiserror::Error;

/// Duration assigned when none can be read. Large enough to count as long-form.
pub const LONG_FORM_SENTINEL_SECS: u64 = 86_400;

const UNKNOWN_CHANNEL: &str = "Unknown";

/// Why a raw item was dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("item has no title")]
    MissingTitle,

    #[error("item title is blank")]
    EmptyTitle,

    #[error("item title has no alphanumeric characters")]
    NoAlphanumeric,
}

/// Turn a raw field bag into a [`FeedItem`]. Pure.
pub fn normalize(raw: &RawFeedItem) -> Result<FeedItem, Rejection> {
    let title = raw
        .title
        .as_deref()
        .ok_or(Rejection::MissingTitle)?
        .trim();

    if title.is_empty() {
        return Err(Rejection::EmptyTitle);
    }
    if !title.chars().any(char::is_alphanumeric) {
        return Err(Rejection::NoAlphanumeric);
    }

    let duration_seconds = raw
        .duration_seconds
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.round() as u64)
        .or_else(|| raw.duration_text.as_deref().and_then(parse_duration_text))
        .unwrap_or(LONG_FORM_SENTINEL_SECS);

    let channel = raw
        .channel
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CHANNEL)
        .to_string();

    let platform = raw
        .platform
        .as_deref()
        .map(Platform::from)
        .unwrap_or_default();

    let source_url = raw
        .source_url
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let id = derive_item_id(&source_url, &platform, &channel, title);

    Ok(FeedItem {
        id,
        title: title.to_string(),
        duration_seconds,
        channel,
        source_url,
        platform,
    })
}

/// Parse `H:MM:SS`, `MM:SS` or bare seconds
pub fn parse_duration_text(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parts: Vec<&str> = text.split(':').map(str::trim).collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: u64 = 0;
    for part in parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_text() {
        assert_eq!(parse_duration_text("0:45"), Some(45));
        assert_eq!(parse_duration_text("12:34"), Some(754));
        assert_eq!(parse_duration_text("1:02:03"), Some(3723));
        assert_eq!(parse_duration_text(" 90 "), Some(90));
        assert_eq!(parse_duration_text("LIVE"), None);
        assert_eq!(parse_duration_text("1:2:3:4"), None);
        assert_eq!(parse_duration_text("1::3"), None);
        assert_eq!(parse_duration_text(""), None);
    }

    #[test]
    fn test_rejects_bad_titles() {
        assert_eq!(
            normalize(&RawFeedItem::default()),
            Err(Rejection::MissingTitle)
        );
        assert_eq!(
            normalize(&RawFeedItem::titled("   ")),
            Err(Rejection::EmptyTitle)
        );
        assert_eq!(
            normalize(&RawFeedItem::titled("!!! ???")),
            Err(Rejection::NoAlphanumeric)
        );
    }

    #[test]
    fn test_defaults() {
        let item = normalize(&RawFeedItem::titled("  Some title  ")).unwrap();
        assert_eq!(item.title, "Some title");
        assert_eq!(item.channel, "Unknown");
        assert_eq!(item.duration_seconds, LONG_FORM_SENTINEL_SECS);
        assert_eq!(item.platform, Platform::YouTube);
        assert!(item.is_long_form());
    }

    #[test]
    fn test_numeric_duration_wins() {
        let raw = RawFeedItem::titled("Clip")
            .with_duration_text("10:00")
            .with_duration_seconds(42.4);
        assert_eq!(normalize(&raw).unwrap().duration_seconds, 42);

        let raw = RawFeedItem::titled("Clip")
            .with_duration_text("10:00")
            .with_duration_seconds(-1.0);
        assert_eq!(normalize(&raw).unwrap().duration_seconds, 600);
    }

    #[test]
    fn test_channel_trimmed() {
        let raw = RawFeedItem::titled("Clip").with_channel("  Chan  ");
        assert_eq!(normalize(&raw).unwrap().channel, "Chan");

        let raw = RawFeedItem::titled("Clip").with_channel("   ");
        assert_eq!(normalize(&raw).unwrap().channel, "Unknown");
    }

    #[test]
    fn test_id_is_deterministic() {
        let raw = RawFeedItem::titled("Clip").with_source_url("https://youtube.com/watch?v=1");
        assert_eq!(normalize(&raw).unwrap().id, normalize(&raw).unwrap().id);
    }
}
