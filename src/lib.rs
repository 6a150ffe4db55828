//! Offline-first synchronization for a filtered, paginated news feed.
//!
//! [`sync::SyncEngine`] fetches pages from a remote article store
//! ([`remote::StoreClient`]), falls back to the newest articles when filters
//! match nothing, and keeps the first page in a local SQLite cache.
//! [`sync::FeedSession`] accumulates pages for one filter selection.
//! [`preferences::Preferences`] holds interests, region, push token,
//! bookmarks and reading history.

pub mod config;
pub mod model;
pub mod preferences;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod util;
