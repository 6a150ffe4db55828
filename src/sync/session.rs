use crate::model::ArticleRecord;
use crate::remote::ArticleStore;

use super::dedup::merge_dedup;
use super::engine::SyncEngine;
use super::query::{FeedPage, FeedQuery, PageOutcome};

/// Where a feed session is in its load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading { page: usize },
    Loaded { has_more: bool },
    Empty,
    FallbackApplied,
    Exhausted,
    Failed,
}

/// Identifies which request a result answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    page: usize,
}

/// A page request handed out by [`FeedSession::next_request`].
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub query: FeedQuery,
    pub ticket: Ticket,
}

/// Accumulated feed for one filter selection.
///
/// Owns the pages loaded so far and decides which page comes next. A filter
/// change or refresh starts a new generation; results carrying an older
/// ticket are dropped.
#[derive(Debug, Clone)]
pub struct FeedSession {
    base: FeedQuery,
    items: Vec<ArticleRecord>,
    next_page: usize,
    has_more: bool,
    state: SessionState,
    generation: u64,
    showing_cache: bool,
}

impl FeedSession {
    pub fn new(base: FeedQuery) -> Self {
        Self {
            base: base.with_page(0),
            items: Vec::new(),
            next_page: 0,
            has_more: true,
            state: SessionState::Idle,
            generation: 0,
            showing_cache: false,
        }
    }

    pub fn items(&self) -> &[ArticleRecord] {
        &self.items
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Loading { .. })
    }

    /// True while the items come from the local cache rather than the store.
    pub fn is_showing_cache(&self) -> bool {
        self.showing_cache
    }

    pub fn query(&self) -> &FeedQuery {
        &self.base
    }

    /// Claim the next page. `None` while a load is in flight or once pages
    /// have run out.
    pub fn next_request(&mut self) -> Option<PageRequest> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        Some(self.start_loading(self.next_page))
    }

    fn start_loading(&mut self, page: usize) -> PageRequest {
        self.state = SessionState::Loading { page };
        PageRequest {
            query: self.base.with_page(page),
            ticket: Ticket {
                generation: self.generation,
                page,
            },
        }
    }

    /// Merge the result of a request issued by this session.
    ///
    /// Returns `false` if the result was stale and ignored.
    pub fn apply(&mut self, ticket: Ticket, page: FeedPage) -> bool {
        if ticket.generation != self.generation
            || self.state != (SessionState::Loading { page: ticket.page })
        {
            tracing::debug!(
                page = ticket.page,
                generation = ticket.generation,
                current = self.generation,
                "Discarding stale feed page"
            );
            return false;
        }

        let first = ticket.page == 0;
        let returned = page.articles.len();

        match page.outcome {
            PageOutcome::Loaded => {
                if first {
                    self.items = merge_dedup(&[], &page.articles);
                    self.showing_cache = false;
                } else {
                    self.items = merge_dedup(&self.items, &page.articles);
                }
                self.has_more = returned >= self.base.page_size;
                self.next_page = ticket.page.saturating_add(1);
                self.state = if self.has_more || first {
                    SessionState::Loaded {
                        has_more: self.has_more,
                    }
                } else {
                    SessionState::Exhausted
                };
            }
            PageOutcome::FallbackApplied => {
                self.items = page.articles;
                self.showing_cache = false;
                self.has_more = false;
                self.state = SessionState::FallbackApplied;
            }
            PageOutcome::Empty | PageOutcome::EmptyInterestSet => {
                // Page 0 keeps whatever is already shown (the cached feed).
                self.has_more = false;
                self.state = if first {
                    SessionState::Empty
                } else {
                    SessionState::Exhausted
                };
            }
            PageOutcome::Failed(_) => {
                self.has_more = false;
                self.state = SessionState::Failed;
            }
        }
        true
    }

    /// Switch filters. Drops the accumulation; the next request is page 0.
    pub fn set_filter(&mut self, category: Option<String>, region: impl Into<String>) {
        self.base = self
            .base
            .clone()
            .with_category(category)
            .with_region(region)
            .with_page(0);
        self.reset();
    }

    /// Replace the interest set. Same effect as a filter change.
    pub fn set_interests(&mut self, interests: std::collections::BTreeSet<String>) {
        self.base.interests = interests;
        self.reset();
    }

    fn reset(&mut self) {
        self.items.clear();
        self.showing_cache = false;
        self.generation += 1;
        self.next_page = 0;
        self.has_more = true;
        self.state = SessionState::Idle;
    }

    /// Start over from page 0 in any state, keeping the current items on
    /// screen until the new page arrives.
    pub fn begin_refresh(&mut self) -> PageRequest {
        self.generation += 1;
        self.next_page = 0;
        self.has_more = true;
        self.start_loading(0)
    }

    /// Show cached rows before the first page lands.
    ///
    /// Only applies to an empty mixed-feed session; returns whether the
    /// rows were taken.
    pub fn seed_from_cache(&mut self, records: Vec<ArticleRecord>) -> bool {
        if !self.items.is_empty() || records.is_empty() || !self.base.is_default_feed() {
            return false;
        }
        self.items = records;
        self.showing_cache = true;
        true
    }

    /// Fetch and merge the next page. `None` if no page was due.
    pub async fn load_next<S: ArticleStore>(
        &mut self,
        engine: &SyncEngine<S>,
    ) -> Option<PageOutcome> {
        let request = self.next_request()?;
        let page = engine.fetch_page(&request.query).await;
        let outcome = page.outcome.clone();
        self.apply(request.ticket, page);
        Some(outcome)
    }

    /// Refresh through the engine and replace the accumulation with page 0.
    pub async fn refresh<S: ArticleStore>(&mut self, engine: &SyncEngine<S>) -> PageOutcome {
        let request = self.begin_refresh();
        let page = engine.refresh(&request.query).await;
        let outcome = page.outcome.clone();
        self.apply(request.ticket, page);
        outcome
    }
}
