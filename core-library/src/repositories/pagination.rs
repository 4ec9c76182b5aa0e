//! Cursor pagination for key-ordered realtime database queries

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not configure one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Cursor page request
///
/// Children are read in key order, starting strictly after `start_after`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Last key of the previous page, `None` for the first page
    pub start_after: Option<String>,
    /// Number of items per page
    pub page_size: u32,
}

impl PageRequest {
    /// First page
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::first(10);
    /// assert_eq!(request.start_after, None);
    /// assert_eq!(request.fetch_limit(), 11);
    /// ```
    pub fn first(page_size: u32) -> Self {
        Self {
            start_after: None,
            page_size: page_size.max(1),
        }
    }

    /// Page starting after `key`
    pub fn after(key: impl Into<String>, page_size: u32) -> Self {
        Self {
            start_after: Some(key.into()),
            page_size: page_size.max(1),
        }
    }

    /// Children to request: one extra to learn whether another page exists.
    pub fn fetch_limit(&self) -> u32 {
        self.page_size.saturating_add(1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of key-ordered results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Key of the last item, the cursor for the next request
    pub last_key: Option<String>,
    /// Whether at least one more item exists after this page
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from `(key, item)` rows fetched with
    /// [`PageRequest::fetch_limit`]. The lookahead row is dropped.
    ///
    /// ```
    /// use core_library::repositories::{Page, PageRequest};
    ///
    /// let request = PageRequest::first(2);
    /// let rows = vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)];
    /// let page = Page::from_lookahead(rows, &request);
    ///
    /// assert_eq!(page.items, vec![1, 2]);
    /// assert_eq!(page.last_key.as_deref(), Some("b"));
    /// assert!(page.has_more);
    /// ```
    pub fn from_lookahead(mut rows: Vec<(String, T)>, request: &PageRequest) -> Self {
        let page_size = request.page_size as usize;
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);
        let last_key = rows.last().map(|(key, _)| key.clone());

        Self {
            items: rows.into_iter().map(|(_, item)| item).collect(),
            last_key,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            last_key: None,
            has_more: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Request for the following page, `None` when this was the last one.
    pub fn next_request(&self, page_size: u32) -> Option<PageRequest> {
        match (&self.last_key, self.has_more) {
            (Some(key), true) => Some(PageRequest::after(key.clone(), page_size)),
            _ => None,
        }
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            last_key: self.last_key,
            has_more: self.has_more,
        }
    }
}
