use anyhow::{Context, Result};

use crate::preferences::Preferences;
use crate::remote::{ArticleStore, StoreQuery};
use crate::storage::Database;

/// Headline used when the newest row has no title.
const FALLBACK_HEADLINE: &str = "New stories available";

/// Articles that appeared since the previous check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticles {
    pub new_count: u64,
    pub top_headline: String,
}

/// Compare the store's row count with the one recorded last time.
///
/// Reports new articles only when the count grew and a previous count exists,
/// so the very first run stays quiet. The current count is always recorded.
/// Store failures are returned so a scheduler can retry later.
pub async fn check_new_articles<S: ArticleStore>(
    store: &S,
    db: &Database,
) -> Result<Option<NewArticles>> {
    let prefs = Preferences::new(db.clone());
    let current = store
        .count_articles()
        .await
        .context("Failed to count articles")?;
    let last = prefs.last_article_count().await?;

    let report = if current > last && last > 0 {
        let newest = store
            .select_articles(&StoreQuery::unfiltered(1))
            .await
            .context("Failed to fetch newest article")?;
        let top_headline = newest
            .into_iter()
            .next()
            .map(|a| a.title)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_HEADLINE.to_string());

        tracing::info!(new_count = current - last, "New articles since last check");
        Some(NewArticles {
            new_count: current - last,
            top_headline,
        })
    } else {
        tracing::debug!(current, last, "No new articles");
        None
    };

    prefs.set_last_article_count(current).await?;
    Ok(report)
}
