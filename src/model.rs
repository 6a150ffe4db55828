//! Wire and domain types shared by the remote store, the page cache and the
//! preference-backed library lists.
//!
//! Rows in the article store were written by several revisions of the ingestion
//! pipeline, so every field is decoded leniently: unknown columns are ignored,
//! missing strings become empty, `null` strings become empty and missing
//! optionals become `None`.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholders the summarization pipeline writes when analysis fails.
const FAILED_SUMMARY_MARKERS: &[&str] = &[
    "Analysis Failed",
    "Analysis Unavailable",
    "AI Summary Unavailable",
];

// ============================================================================
// ArticleRecord
// ============================================================================

/// One ingested news item.
///
/// Records are immutable value objects: they are decoded from store responses
/// and only ever copied into the cache, bookmarks or history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    /// Raw timestamp as stored upstream. See [`ArticleRecord::published_at`].
    #[serde(default, alias = "published_at", deserialize_with = "null_as_empty")]
    pub published: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub trust_badge: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub icon: String,
    /// Canonical URL. The preferred identity key.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub link: String,
    #[serde(default)]
    pub tier: Option<i32>,
    #[serde(default)]
    pub trust_score: Option<i32>,
    #[serde(default)]
    pub trust_reason: Option<String>,
    #[serde(default)]
    pub related_links: Option<Vec<String>>,
}

impl ArticleRecord {
    /// Identity used for dedup and library membership.
    ///
    /// `link` wins; `id` is the legacy fallback. Rows lacking both return
    /// `None` and are never collapsed with anything.
    pub fn identity(&self) -> Option<&str> {
        if !self.link.is_empty() {
            Some(&self.link)
        } else if !self.id.is_empty() {
            Some(&self.id)
        } else {
            None
        }
    }

    /// True if both records refer to the same article.
    ///
    /// Links decide when both sides have one. Older library entries were
    /// keyed by `id` only, so a side without a link falls back to a
    /// non-empty `id`.
    pub fn matches(&self, other: &ArticleRecord) -> bool {
        if !self.link.is_empty() && !other.link.is_empty() {
            return self.link == other.link;
        }
        !self.id.is_empty() && self.id == other.id
    }

    /// True if `key` equals this record's link or (legacy) id.
    pub fn matches_key(&self, key: &str) -> bool {
        !key.is_empty() && (self.link == key || self.id == key)
    }

    /// Best-effort parse of the publish timestamp.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.published)
    }

    /// True if the record carries a usable AI summary rather than a
    /// pipeline failure placeholder.
    pub fn has_ai_summary(&self) -> bool {
        match self.ai_summary.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => !FAILED_SUMMARY_MARKERS.iter().any(|m| s.starts_with(m)),
            _ => false,
        }
    }

    /// The AI summary when usable, otherwise the plain summary.
    pub fn best_summary(&self) -> &str {
        if self.has_ai_summary() {
            self.ai_summary.as_deref().unwrap_or(&self.summary)
        } else {
            &self.summary
        }
    }

    /// Trust score clamped to 0..=100.
    pub fn trust(&self) -> Option<u8> {
        self.trust_score.map(|s| s.clamp(0, 100) as u8)
    }
}

/// Parse a timestamp in any of the formats the ingestion pipeline has produced.
///
/// Naive timestamps are interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres text output: "2024-01-05 10:30:00+00"
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ids were text in early schema revisions and bigint later.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

// ============================================================================
// DailyReel
// ============================================================================

/// A precomputed bundle of top stories, published as one briefing row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReel {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default)]
    pub stories: Vec<ArticleRecord>,
}

/// Row shape of the briefings collection. The reel lives in `content`.
#[derive(Debug, Deserialize)]
pub(crate) struct BriefingRow {
    #[serde(default)]
    pub content: Option<DailyReel>,
}

// ============================================================================
// WatchlistEntry
// ============================================================================

/// A standing keyword alert for one push identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchlistEntry {
    #[serde(rename = "user_fcm_token")]
    pub push_token: String,
    pub keyword: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_lenient_decode_minimal_row() {
        let record: ArticleRecord =
            serde_json::from_str(r#"{"title": "Hello", "link": "https://a.example/1"}"#).unwrap();
        assert_eq!(record.title, "Hello");
        assert_eq!(record.id, "");
        assert!(record.tier.is_none());
        assert!(record.related_links.is_none());
    }

    #[test]
    fn test_numeric_id_decodes_as_text() {
        let record: ArticleRecord = serde_json::from_str(r#"{"id": 1234, "title": "N"}"#).unwrap();
        assert_eq!(record.id, "1234");
    }

    #[test]
    fn test_decode_ignores_unknown_and_nulls() {
        let json = r#"{
            "id": null,
            "title": "T",
            "summary": null,
            "published_at": "2024-01-05T10:00:00Z",
            "link": "https://a.example/2",
            "trust_score": 87,
            "related_links": ["https://b.example"],
            "embedding": [0.1, 0.2]
        }"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(record.summary, "");
        assert_eq!(record.published, "2024-01-05T10:00:00Z");
        assert_eq!(record.trust(), Some(87));
        assert_eq!(
            record.related_links,
            Some(vec!["https://b.example".to_string()])
        );
    }

    #[test]
    fn test_identity_prefers_link() {
        let mut r = ArticleRecord {
            id: "42".into(),
            link: "https://a.example/x".into(),
            ..Default::default()
        };
        assert_eq!(r.identity(), Some("https://a.example/x"));
        r.link.clear();
        assert_eq!(r.identity(), Some("42"));
        r.id.clear();
        assert_eq!(r.identity(), None);
    }

    #[test]
    fn test_matches_on_legacy_id() {
        let old = ArticleRecord {
            id: "7".into(),
            ..Default::default()
        };
        let new = ArticleRecord {
            id: "7".into(),
            link: "https://a.example/7".into(),
            ..Default::default()
        };
        assert!(old.matches(&new));
        assert!(new.matches(&old));
        assert!(!ArticleRecord::default().matches(&ArticleRecord::default()));
    }

    #[test]
    fn test_distinct_links_never_match_on_shared_id() {
        let a = ArticleRecord {
            id: "5".into(),
            link: "https://a.example/x".into(),
            ..Default::default()
        };
        let b = ArticleRecord {
            id: "5".into(),
            link: "https://b.example/y".into(),
            ..Default::default()
        };
        assert!(!a.matches(&b));
        assert!(a.matches(&a.clone()));
    }

    #[test]
    fn test_failed_ai_summary_is_ignored() {
        let mut r = ArticleRecord {
            summary: "plain".into(),
            ai_summary: Some("Analysis Failed".into()),
            ..Default::default()
        };
        assert!(!r.has_ai_summary());
        assert_eq!(r.best_summary(), "plain");

        r.ai_summary = Some("<b>The Core Story</b>".into());
        assert!(r.has_ai_summary());
        assert_eq!(r.best_summary(), "<b>The Core Story</b>");
    }

    #[test]
    fn test_trust_is_clamped() {
        let r = ArticleRecord {
            trust_score: Some(140),
            ..Default::default()
        };
        assert_eq!(r.trust(), Some(100));
    }

    #[test]
    fn test_parse_known_timestamp_formats() {
        let cases = [
            "2024-01-05T10:30:00Z",
            "2024-01-05T10:30:00.123456+00:00",
            "Fri, 05 Jan 2024 10:30:00 +0000",
            "2024-01-05 10:30:00+00",
            "2024-01-05 10:30:00",
            "2024-01-05T10:30:00",
        ];
        for raw in cases {
            let dt = parse_timestamp(raw).unwrap_or_else(|| panic!("failed to parse {raw}"));
            assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 5), "{raw}");
            assert_eq!(dt.hour(), 10, "{raw}");
        }
        assert!(parse_timestamp("2024-01-05").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_watchlist_wire_names() {
        let entry = WatchlistEntry {
            push_token: "tok".into(),
            keyword: "nvidia".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["user_fcm_token"], "tok");
        assert_eq!(json["keyword"], "nvidia");
    }

    #[test]
    fn test_reel_row_decode() {
        let row: BriefingRow = serde_json::from_str(
            r#"{"date_str": "2024-01-05", "content": {"title": "Reel", "stories": [{"title": "A"}]}}"#,
        )
        .unwrap();
        let reel = row.content.unwrap();
        assert_eq!(reel.title, "Reel");
        assert_eq!(reel.summary, "");
        assert_eq!(reel.stories.len(), 1);
    }
}
