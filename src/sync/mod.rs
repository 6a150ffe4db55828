//! Feed synchronization.
//!
//! - `engine` - page fetches, fallback probe, page cache, refresh, watchlist
//! - `session` - incremental loading and merge for one filter selection
//! - `dedup` - identity-based merge of pages
//! - `worker` - background new-article check

mod dedup;
mod engine;
mod query;
mod session;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use dedup::merge_dedup;
pub use engine::{SyncEngine, DEFAULT_PROBE_LIMIT};
pub use query::{FeedPage, FeedQuery, PageOutcome, ALL_CATEGORIES, GLOBAL_REGION};
pub use session::{FeedSession, PageRequest, SessionState, Ticket};
pub use worker::{check_new_articles, NewArticles};
