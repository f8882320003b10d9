use serde::{Deserialize, Serialize};

/// A DRF page: `{count, next, previous, results}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A collection answer. Paginated endpoints return a [`Page`]; the
/// "popular", "pending" and "my uploads" endpoints return a bare array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    Items(Vec<T>),
}

impl<T> Listing<T> {
    #[must_use]
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Page(page) => &page.results,
            Listing::Items(items) => items,
        }
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page(page) => page.results,
            Listing::Items(items) => items,
        }
    }

    /// Total number of matching records on the server, which for a page
    /// can exceed the number of items returned.
    #[must_use]
    pub fn total(&self) -> u64 {
        match self {
            Listing::Page(page) => page.count,
            Listing::Items(items) => items.len() as u64,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        matches!(self, Listing::Page(Page { next: Some(_), .. }))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Listing::Items(Vec::new())
    }
}
