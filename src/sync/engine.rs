use std::sync::Arc;

use crate::model::{ArticleRecord, DailyReel, WatchlistEntry};
use crate::preferences::Preferences;
use crate::remote::{ArticleStore, RefreshTrigger, StoreQuery};
use crate::storage::{CacheSnapshot, Database};

use super::query::{FeedPage, FeedQuery, PageOutcome};

/// Rows fetched by the unfiltered probe when a filtered first page is empty.
pub const DEFAULT_PROBE_LIMIT: usize = 5;

/// Fetches feed pages from the remote store and keeps the local page cache.
///
/// Holds no filter or pagination state: every call takes an explicit
/// [`FeedQuery`]. Cloning is cheap and clones share the store client and the
/// database pool.
pub struct SyncEngine<S> {
    store: Arc<S>,
    db: Database,
    trigger: Option<RefreshTrigger>,
    probe_limit: usize,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            db: self.db.clone(),
            trigger: self.trigger.clone(),
            probe_limit: self.probe_limit,
        }
    }
}

impl<S: ArticleStore> SyncEngine<S> {
    pub fn new(store: S, db: Database) -> Self {
        Self {
            store: Arc::new(store),
            db,
            trigger: None,
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }

    pub fn with_trigger(mut self, trigger: RefreshTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_probe_limit(mut self, limit: usize) -> Self {
        self.probe_limit = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch one page of the feed described by `query`.
    ///
    /// Never fails: transport and decode errors come back as
    /// [`PageOutcome::Failed`] with an empty list.
    pub async fn fetch_page(&self, query: &FeedQuery) -> FeedPage {
        let Some(store_query) = query.to_store_query() else {
            tracing::debug!("Interest set is empty, skipping store query");
            return FeedPage::empty(PageOutcome::EmptyInterestSet);
        };

        let articles = match self.store.select_articles(&store_query).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(error = %e, page = query.page, "Feed page fetch failed");
                return FeedPage::empty(PageOutcome::Failed(e.to_string()));
            }
        };

        if articles.is_empty() {
            if query.page == 0 && store_query.is_filtered() {
                return self.probe_unfiltered().await;
            }
            return FeedPage::empty(PageOutcome::Empty);
        }

        tracing::debug!(page = query.page, count = articles.len(), "Feed page loaded");

        if query.page == 0 && query.is_default_feed() {
            if let Err(e) = self.db.write_page_cache(&articles).await {
                tracing::warn!(error = %e, "Failed to write page cache");
            }
        }

        FeedPage::new(articles, PageOutcome::Loaded)
    }

    /// Newest articles regardless of filters, used when filters match nothing.
    async fn probe_unfiltered(&self) -> FeedPage {
        let probe = StoreQuery::unfiltered(self.probe_limit);
        match self.store.select_articles(&probe).await {
            Ok(articles) if !articles.is_empty() => {
                tracing::info!(
                    count = articles.len(),
                    "Filters matched nothing, showing latest articles instead"
                );
                FeedPage::new(articles, PageOutcome::FallbackApplied)
            }
            Ok(_) => FeedPage::empty(PageOutcome::Empty),
            Err(e) => {
                tracing::warn!(error = %e, "Fallback probe failed");
                FeedPage::empty(PageOutcome::Empty)
            }
        }
    }

    /// The most recent daily briefing, or `None` on any failure.
    pub async fn fetch_morning_reel(&self) -> Option<DailyReel> {
        match self.store.latest_reel().await {
            Ok(reel) => reel,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch morning reel");
                None
            }
        }
    }

    /// The last cached first page. Empty if missing, corrupt or unreadable.
    pub async fn cached_feed(&self) -> Vec<ArticleRecord> {
        self.cache_snapshot().await.items
    }

    /// The cached first page with its write time.
    pub async fn cache_snapshot(&self) -> CacheSnapshot {
        match self.db.read_page_cache().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read page cache");
                CacheSnapshot::default()
            }
        }
    }

    /// Drop the cached first page. The next default-feed load rewrites it.
    pub async fn clear_cache(&self) -> anyhow::Result<()> {
        self.db.clear_page_cache().await?;
        tracing::info!("Page cache cleared");
        Ok(())
    }

    /// Ask the upstream job to re-crawl. `false` if no relay is configured.
    pub async fn trigger_remote_refresh(&self) -> bool {
        match &self.trigger {
            Some(trigger) => trigger.fire().await,
            None => {
                tracing::debug!("No refresh relay configured");
                false
            }
        }
    }

    /// Fire the refresh relay, then fetch page 0 of `query`.
    ///
    /// The relay only queues a crawl; the page may not reflect it yet.
    pub async fn refresh(&self, query: &FeedQuery) -> FeedPage {
        self.trigger_remote_refresh().await;
        self.fetch_page(&query.with_page(0)).await
    }

    /// Register a keyword alert for this device's push token.
    ///
    /// Returns `true` only when the store accepted the entry.
    pub async fn add_watchlist_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            tracing::debug!("Ignoring blank watchlist keyword");
            return false;
        }

        let push_token = match Preferences::new(self.db.clone()).push_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!("No push token registered, watchlist keyword not saved");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read push token");
                return false;
            }
        };

        let entry = WatchlistEntry {
            push_token,
            keyword: keyword.to_string(),
        };
        match self.store.insert_watchlist(&entry).await {
            Ok(()) => {
                tracing::info!(keyword, "Watchlist keyword added");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, keyword, "Failed to add watchlist keyword");
                false
            }
        }
    }
}
