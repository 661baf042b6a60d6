//! Paged search results.
//!
//! [`PageWindow`] turns the caller's 1-based page and page size into an offset and limit;
//! [`SearchResults`] is the envelope returned by a search.

use serde::{Deserialize, Serialize};

/// A page of search results.
///
/// `item_count` is the number of matches before paging. `more` is set when matches
/// exist beyond this page.
///
/// # Example
///
/// ```ignore
/// use docbridge::page::SearchResults;
///
/// let results = SearchResults::builder(vec!["a", "b"])
///     .with_item_count(5)
///     .with_page(1, 2)
///     .with_more(true)
///     .build();
///
/// assert_eq!(results.results.len(), 2);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResults<T> {
    pub more: bool,
    pub page: i64,
    pub page_size: i64,
    pub item_count: u64,
    pub results: Vec<T>,
}

impl<T> SearchResults<T> {
    pub fn builder(results: Vec<T>) -> SearchResultsBuilder<T> {
        SearchResultsBuilder::new(results)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResults<U> {
        SearchResults {
            more: self.more,
            page: self.page,
            page_size: self.page_size,
            item_count: self.item_count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

impl<T> Default for SearchResults<T> {
    fn default() -> Self {
        Self {
            more: false,
            page: 1,
            page_size: 0,
            item_count: 0,
            results: Vec::new(),
        }
    }
}

/// Builder for [`SearchResults`].
pub struct SearchResultsBuilder<T> {
    inner: SearchResults<T>,
}

impl<T> SearchResultsBuilder<T> {
    pub fn new(results: Vec<T>) -> Self {
        Self {
            inner: SearchResults { results, ..SearchResults::default() },
        }
    }

    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.inner.item_count = item_count;
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.inner.page = page;
        self.inner.page_size = page_size;
        self
    }

    pub fn with_more(mut self, more: bool) -> Self {
        self.inner.more = more;
        self
    }

    pub fn build(self) -> SearchResults<T> {
        self.inner
    }
}

/// The slice of a result set a search returns.
///
/// Pages are 1-indexed; a page below 1 reads as page 1. A page size of zero or less
/// means "everything, unpaged".
///
/// ```ignore
/// let window = PageWindow::new(3, 20);
/// assert_eq!(window.offset(), 40);
/// assert_eq!(window.limit(), Some(20));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: Option<usize>,
}

impl PageWindow {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1) as usize,
            page_size: (page_size > 0).then_some(page_size as usize),
        }
    }

    /// Unpaged window covering every match.
    pub fn unpaged() -> Self {
        Self { page: 1, page_size: None }
    }

    pub fn is_paged(&self) -> bool {
        self.page_size.is_some()
    }

    /// Number of items before this page.
    pub fn offset(&self) -> usize {
        match self.page_size {
            Some(size) => (self.page - 1).saturating_mul(size),
            None => 0,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.page_size
    }

    /// Extracts this window from a complete, ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.page_size {
            Some(size) => items
                .into_iter()
                .skip(self.offset())
                .take(size)
                .collect(),
            None => items,
        }
    }

    /// Whether matches exist past this window, given the total and the number returned.
    pub fn has_more(&self, item_count: u64, returned: usize) -> bool {
        item_count > (self.offset() + returned) as u64
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::unpaged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_clamp_the_page_and_disable_paging_for_non_positive_sizes() {
        assert_eq!(PageWindow::new(0, 10), PageWindow { page: 1, page_size: Some(10) });
        assert_eq!(PageWindow::new(-4, 10).offset(), 0);
        assert_eq!(PageWindow::new(3, 0), PageWindow { page: 3, page_size: None });
        assert_eq!(PageWindow::new(3, -1).offset(), 0);
    }

    #[test]
    fn slices_follow_offset_and_size() {
        let items = (1..=25).collect::<Vec<_>>();

        assert_eq!(PageWindow::new(2, 10).slice(items.clone()), (11..=20).collect::<Vec<_>>());
        assert_eq!(PageWindow::new(3, 10).slice(items.clone()), (21..=25).collect::<Vec<_>>());
        assert!(PageWindow::new(4, 10).slice(items.clone()).is_empty());
        assert_eq!(PageWindow::new(4, 0).slice(items.clone()), items);
    }

    #[test]
    fn more_is_set_while_items_remain() {
        assert!(PageWindow::new(1, 10).has_more(25, 10));
        assert!(PageWindow::new(2, 10).has_more(25, 10));
        assert!(!PageWindow::new(3, 10).has_more(25, 5));
        assert!(!PageWindow::new(1, 0).has_more(25, 25));
    }

    #[test]
    fn iterating_pages_visits_every_item_once() {
        let items = (0..23).collect::<Vec<_>>();
        let mut seen = Vec::new();
        let mut page = 1;

        loop {
            let window = PageWindow::new(page, 5);
            let slice = window.slice(items.clone());
            let more = window.has_more(items.len() as u64, slice.len());
            seen.extend(slice);

            if !more {
                break;
            }
            page += 1;
        }

        assert_eq!(seen, items);
    }

    #[test]
    fn results_map_keeps_metadata() {
        let results = SearchResults::builder(vec![1, 2])
            .with_item_count(7)
            .with_page(2, 2)
            .with_more(true)
            .build()
            .map(|n| n * 10);

        assert_eq!(results.results, vec![10, 20]);
        assert_eq!(results.item_count, 7);
        assert!(results.more);
        assert_eq!(results.page, 2);
    }
}
