use std::collections::BTreeSet;

use crate::model::ArticleRecord;
use crate::remote::{CategoryFilter, StoreQuery};

/// Region value meaning "no region filter".
pub const GLOBAL_REGION: &str = "Global";

/// Category value meaning "use the interest set".
pub const ALL_CATEGORIES: &str = "All";

/// One feed request as the consumer describes it.
///
/// Passed explicitly on every call; the engine keeps no filter state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// 0-based page index.
    pub page: usize,
    pub page_size: usize,
    pub region: String,
    /// Single-category override. `None`, empty, or [`ALL_CATEGORIES`] fall
    /// back to `interests`.
    pub category: Option<String>,
    pub interests: BTreeSet<String>,
}

impl FeedQuery {
    /// Page 0 of the mixed feed for `interests`, no region filter.
    pub fn new(interests: BTreeSet<String>, page_size: usize) -> Self {
        Self {
            page: 0,
            page_size,
            region: GLOBAL_REGION.to_string(),
            category: None,
            interests,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// The effective single-category override, sentinels removed.
    pub fn category_override(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }

    /// The effective region filter, sentinel removed.
    pub fn region_filter(&self) -> Option<&str> {
        let region = self.region.trim();
        (!region.is_empty() && region != GLOBAL_REGION).then_some(region)
    }

    /// True for the mixed, interest-driven feed whose first page is cached.
    pub fn is_default_feed(&self) -> bool {
        self.category_override().is_none()
    }

    /// Resolve into a store query, or `None` when there is nothing to ask for
    /// (empty interest set and no override).
    pub fn to_store_query(&self) -> Option<StoreQuery> {
        let category = match self.category_override() {
            Some(value) => CategoryFilter::Equals(value.to_string()),
            None if self.interests.is_empty() => return None,
            None => CategoryFilter::AnyOf(self.interests.iter().cloned().collect()),
        };

        let mut query = StoreQuery::page(self.page, self.page_size).with_category(category);
        if let Some(region) = self.region_filter() {
            query = query.with_region(region);
        }
        Some(query)
    }
}

/// How a page request resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The filtered query returned rows.
    Loaded,
    /// Nothing matched and the unfiltered probe found nothing either.
    Empty,
    /// Nothing matched; the rows are the newest unfiltered articles instead.
    FallbackApplied,
    /// No interests and no override: the store was not consulted.
    EmptyInterestSet,
    /// Transport or decode failure, with the error text.
    Failed(String),
}

/// Result of one page request. Never an error: failures are an outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub articles: Vec<ArticleRecord>,
    pub outcome: PageOutcome,
}

impl FeedPage {
    pub(crate) fn new(articles: Vec<ArticleRecord>, outcome: PageOutcome) -> Self {
        Self { articles, outcome }
    }

    pub(crate) fn empty(outcome: PageOutcome) -> Self {
        Self::new(Vec::new(), outcome)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PageOutcome::Failed(_))
    }
}
