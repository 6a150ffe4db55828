//! Typed preference accessors over the `user_preferences` table.
//!
//! Every value is stored as a string; lists and sets are JSON. Reads fall back
//! to defaults when a key is unset or its value is undecodable. Every
//! read-modify-write runs inside one SQLite transaction.
use std::collections::BTreeSet;

use anyhow::Result;

use crate::model::ArticleRecord;
use crate::storage::Database;

/// Categories the ingestion pipeline tags articles with.
pub const KNOWN_CATEGORIES: [&str; 11] = [
    "India News",
    "World News",
    "Business",
    "Technology",
    "Science",
    "Health",
    "Politics",
    "Entertainment",
    "Sports",
    "AI & Frontiers",
    "Cybersecurity",
];

/// Regions the store partitions articles by. `Global` means no region filter.
pub const KNOWN_REGIONS: [&str; 3] = ["Global", "India", "USA"];

pub const DEFAULT_REGION: &str = "Global";

/// Most recent reads kept in history.
pub const HISTORY_LIMIT: usize = 20;

const REGIONAL_CATEGORY: &str = "India News";
const REGIONAL_COUNTRY: &str = "IN";

mod keys {
    pub const ONBOARDED: &str = "onboarded";
    pub const INTERESTS: &str = "interests";
    pub const REGION: &str = "region";
    pub const PUSH_TOKEN: &str = "push_token";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const HISTORY: &str = "history";
    pub const LAST_ARTICLE_COUNT: &str = "sync.last_article_count";
}

/// Interest set for a user who never picked one.
///
/// All known categories, minus the India-specific one when `locale` names a
/// country other than India. An absent or country-less locale keeps them all.
pub fn default_interests(locale: Option<&str>) -> BTreeSet<String> {
    let drop_regional = locale
        .and_then(locale_country)
        .is_some_and(|country| !country.eq_ignore_ascii_case(REGIONAL_COUNTRY));

    KNOWN_CATEGORIES
        .iter()
        .filter(|c| !(drop_regional && **c == REGIONAL_CATEGORY))
        .map(|c| c.to_string())
        .collect()
}

/// Country part of a POSIX or BCP 47 locale: `en_IN.UTF-8` and `en-US` both work.
fn locale_country(locale: &str) -> Option<&str> {
    let base = locale.split(['.', '@']).next()?;
    let (_, country) = base.split_once(['_', '-'])?;
    (!country.is_empty()).then_some(country)
}

// ============================================================================
// Preferences
// ============================================================================

/// User settings and library (bookmarks, history) backed by the local database.
#[derive(Debug, Clone)]
pub struct Preferences {
    db: Database,
    locale: Option<String>,
}

impl Preferences {
    pub fn new(db: Database) -> Self {
        Self { db, locale: None }
    }

    /// Locale used to derive the default interest set.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub async fn is_onboarded(&self) -> Result<bool> {
        Ok(self
            .db
            .get_preference(keys::ONBOARDED)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(false))
    }

    /// Selected categories, or the locale default if none were ever saved.
    pub async fn interests(&self) -> Result<BTreeSet<String>> {
        let stored = self.db.get_preference(keys::INTERESTS).await?;
        Ok(stored
            .and_then(|raw| decode_json(keys::INTERESTS, &raw))
            .unwrap_or_else(|| default_interests(self.locale.as_deref())))
    }

    /// Persist the interest set and mark onboarding complete, atomically.
    pub async fn save_interests(&self, interests: &BTreeSet<String>) -> Result<()> {
        let encoded = serde_json::to_string(interests)?;
        self.db
            .set_preferences(&[(keys::INTERESTS, &encoded), (keys::ONBOARDED, "true")])
            .await
    }

    pub async fn region(&self) -> Result<String> {
        Ok(self
            .db
            .get_preference(keys::REGION)
            .await?
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()))
    }

    /// Blank input resets to [`DEFAULT_REGION`].
    pub async fn set_region(&self, region: &str) -> Result<()> {
        let region = region.trim();
        let region = if region.is_empty() {
            DEFAULT_REGION
        } else {
            region
        };
        self.db.set_preference(keys::REGION, region).await
    }

    pub async fn push_token(&self) -> Result<Option<String>> {
        Ok(self
            .db
            .get_preference(keys::PUSH_TOKEN)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    pub async fn set_push_token(&self, token: &str) -> Result<()> {
        self.db.set_preference(keys::PUSH_TOKEN, token.trim()).await
    }

    /// Forget the registered token. Watchlist calls become no-ops again.
    pub async fn clear_push_token(&self) -> Result<()> {
        self.db.delete_preference(keys::PUSH_TOKEN).await
    }

    /// Row count seen by the last background check, 0 if never run.
    pub async fn last_article_count(&self) -> Result<u64> {
        Ok(self
            .db
            .get_preference(keys::LAST_ARTICLE_COUNT)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub async fn set_last_article_count(&self, count: u64) -> Result<()> {
        self.db
            .set_preference(keys::LAST_ARTICLE_COUNT, &count.to_string())
            .await
    }

    // ========================================================================
    // Bookmarks
    // ========================================================================

    pub async fn bookmarks(&self) -> Result<Vec<ArticleRecord>> {
        self.read_list(keys::BOOKMARKS).await
    }

    /// Remove the article if bookmarked, otherwise add it at the front.
    ///
    /// Returns the new bookmarked state. A record with neither link nor id
    /// cannot be matched later, so it is never stored.
    pub async fn toggle_bookmark(&self, article: &ArticleRecord) -> Result<bool> {
        if article.identity().is_none() {
            tracing::debug!(title = %article.title, "Not bookmarking article without link or id");
            return Ok(false);
        }
        self.db
            .update_preference(keys::BOOKMARKS, |current| {
                let mut list = decode_list(keys::BOOKMARKS, current);
                let before = list.len();
                list.retain(|a| !a.matches(article));
                let now_bookmarked = list.len() == before;
                if now_bookmarked {
                    list.insert(0, article.clone());
                }
                Ok((serde_json::to_string(&list)?, now_bookmarked))
            })
            .await
    }

    /// Remove every bookmark whose link or id equals `key`.
    ///
    /// Returns whether anything was removed.
    pub async fn remove_bookmark(&self, key: &str) -> Result<bool> {
        self.db
            .update_preference(keys::BOOKMARKS, |current| {
                let mut list = decode_list(keys::BOOKMARKS, current);
                let before = list.len();
                list.retain(|a| !a.matches_key(key));
                let removed = list.len() != before;
                Ok((serde_json::to_string(&list)?, removed))
            })
            .await
    }

    pub async fn is_bookmarked(&self, key: &str) -> Result<bool> {
        Ok(self
            .bookmarks()
            .await?
            .iter()
            .any(|a| a.matches_key(key)))
    }

    // ========================================================================
    // History
    // ========================================================================

    pub async fn history(&self) -> Result<Vec<ArticleRecord>> {
        self.read_list(keys::HISTORY).await
    }

    /// Move `article` to the front of history, evicting past [`HISTORY_LIMIT`].
    pub async fn add_to_history(&self, article: &ArticleRecord) -> Result<()> {
        if article.identity().is_none() {
            tracing::debug!(title = %article.title, "Not recording article without link or id");
            return Ok(());
        }
        self.db
            .update_preference(keys::HISTORY, |current| {
                let mut list = decode_list(keys::HISTORY, current);
                list.retain(|a| !a.matches(article));
                list.insert(0, article.clone());
                list.truncate(HISTORY_LIMIT);
                Ok((serde_json::to_string(&list)?, ()))
            })
            .await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.db.set_preference(keys::HISTORY, "[]").await
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    async fn read_list(&self, key: &str) -> Result<Vec<ArticleRecord>> {
        let stored = self.db.get_preference(key).await?;
        Ok(decode_list(key, stored.as_deref()))
    }
}

fn decode_list(key: &str, raw: Option<&str>) -> Vec<ArticleRecord> {
    raw.and_then(|raw| decode_json(key, raw)).unwrap_or_default()
}

fn decode_json<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Stored preference is undecodable, using default");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
