//! Store query construction.
//!
//! A [`StoreQuery`] is the resolved, transport-neutral form of one article
//! fetch: optional region equality, optional category constraint, and an
//! inclusive row window. Ordering is always newest-published first.

/// Column the feed is ordered by, newest first.
pub const ORDER_COLUMN: &str = "published";

/// Category constraint of a store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    /// `category = value`
    Equals(String),
    /// `category IN (values)`
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub region: Option<String>,
    pub category: Option<CategoryFilter>,
    pub offset: usize,
    pub limit: usize,
}

impl StoreQuery {
    /// Newest `limit` rows with no filters at all.
    pub fn unfiltered(limit: usize) -> Self {
        Self {
            region: None,
            category: None,
            offset: 0,
            limit,
        }
    }

    /// Window covering page `page` of `page_size` rows.
    ///
    /// A window past `usize::MAX` keeps the offset pinned there, which
    /// [`StoreQuery::range`] reports as unrepresentable.
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            region: None,
            category: None,
            offset: page.checked_mul(page_size).unwrap_or(usize::MAX),
            limit: page_size,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_category(mut self, filter: CategoryFilter) -> Self {
        self.category = Some(filter);
        self
    }

    pub fn is_filtered(&self) -> bool {
        self.region.is_some() || self.category.is_some()
    }

    /// Inclusive `(first, last)` row window, or `None` for a zero limit or
    /// a window that does not fit in `usize`.
    pub fn range(&self) -> Option<(usize, usize)> {
        let span = self.limit.checked_sub(1)?;
        let last = self.offset.checked_add(span)?;
        Some((self.offset, last))
    }

    /// Render as PostgREST query parameters.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("select", "*".to_string())];

        if let Some(region) = &self.region {
            params.push(("region", format!("eq.{region}")));
        }
        match &self.category {
            Some(CategoryFilter::Equals(value)) => {
                params.push(("category", format!("eq.{value}")));
            }
            Some(CategoryFilter::AnyOf(values)) => {
                let list: Vec<String> = values
                    .iter()
                    .map(String::as_str)
                    .map(quote_list_item)
                    .collect();
                params.push(("category", format!("in.({})", list.join(","))));
            }
            None => {}
        }

        params.push(("order", format!("{ORDER_COLUMN}.desc")));
        params.push(("offset", self.offset.to_string()));
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// Quote one element of a PostgREST `in.(...)` list.
///
/// Category names contain spaces and `&`, so every element is double-quoted
/// with `"` and `\` escaped.
fn quote_list_item(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
