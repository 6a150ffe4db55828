//! Remote collaborators: the queryable article store and the refresh relay.
//!
//! - `query` - resolved store queries and their PostgREST rendering
//! - `client` - HTTP implementation of [`ArticleStore`]
//! - `trigger` - fire-and-forget "please re-crawl" call

mod client;
mod query;
mod trigger;

use std::future::Future;

use thiserror::Error;

use crate::model::{ArticleRecord, DailyReel, WatchlistEntry};
use crate::util::UrlValidationError;

pub use client::StoreClient;
pub use query::{CategoryFilter, StoreQuery, ORDER_COLUMN};
pub use trigger::RefreshTrigger;

/// Errors from the remote article store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body was not the expected JSON shape
    #[error("Decode error: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Count request came back without a usable Content-Range total
    #[error("Missing row count in response")]
    MissingCount,
    #[error("Invalid store endpoint: {0}")]
    InvalidEndpoint(#[from] UrlValidationError),
}

impl StoreError {
    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout | StoreError::Network(_) => true,
            StoreError::HttpStatus(status) => *status == 429 || *status >= 500,
            StoreError::Decode(_)
            | StoreError::ResponseTooLarge(_)
            | StoreError::MissingCount
            | StoreError::InvalidEndpoint(_) => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// The remote article store as the engine sees it.
///
/// [`StoreClient`] talks to a PostgREST endpoint; tests substitute in-memory
/// stores to count calls and script results.
pub trait ArticleStore: Send + Sync {
    /// Rows matching `query`, newest published first.
    fn select_articles(
        &self,
        query: &StoreQuery,
    ) -> impl Future<Output = Result<Vec<ArticleRecord>, StoreError>> + Send;

    /// The most recently created briefing, if any.
    fn latest_reel(&self) -> impl Future<Output = Result<Option<DailyReel>, StoreError>> + Send;

    /// Register a keyword alert.
    fn insert_watchlist(
        &self,
        entry: &WatchlistEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Exact number of rows in the article collection.
    fn count_articles(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
