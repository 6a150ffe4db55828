//! In-memory [`ArticleStore`] for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::model::{ArticleRecord, DailyReel, WatchlistEntry};
use crate::remote::{ArticleStore, CategoryFilter, StoreError, StoreQuery};

/// Rows are held newest first. Region filters are ignored.
#[derive(Default)]
pub(crate) struct FakeStore {
    rows: Mutex<Vec<ArticleRecord>>,
    reel: Mutex<Option<DailyReel>>,
    watchlist: Mutex<Vec<WatchlistEntry>>,
    last_query: Mutex<Option<StoreQuery>>,
    select_calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeStore {
    pub fn with_rows(rows: impl IntoIterator<Item = ArticleRecord>) -> Self {
        let store = Self::default();
        store.set_rows(rows);
        store
    }

    pub fn set_rows(&self, rows: impl IntoIterator<Item = ArticleRecord>) {
        *self.rows.lock().unwrap() = rows.into_iter().collect();
    }

    pub fn set_reel(&self, reel: DailyReel) {
        *self.reel.lock().unwrap() = Some(reel);
    }

    /// Every subsequent call fails with a 503.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<StoreQuery> {
        self.last_query.lock().unwrap().clone()
    }

    pub fn watchlist(&self) -> Vec<WatchlistEntry> {
        self.watchlist.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::HttpStatus(503))
        } else {
            Ok(())
        }
    }
}

impl ArticleStore for FakeStore {
    async fn select_articles(&self, query: &StoreQuery) -> Result<Vec<ArticleRecord>, StoreError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());
        self.check()?;
        if query.range().is_none() {
            return Ok(Vec::new());
        }

        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| match &query.category {
                Some(CategoryFilter::Equals(c)) => &r.category == c,
                Some(CategoryFilter::AnyOf(cs)) => cs.contains(&r.category),
                None => true,
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn latest_reel(&self) -> Result<Option<DailyReel>, StoreError> {
        self.check()?;
        Ok(self.reel.lock().unwrap().clone())
    }

    async fn insert_watchlist(&self, entry: &WatchlistEntry) -> Result<(), StoreError> {
        self.check()?;
        self.watchlist.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn count_articles(&self) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}
