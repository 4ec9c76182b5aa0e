//! Browse session: the paged, searchable inventory view of one screen.
//!
//! A session keeps every page loaded so far, the current [`BookFilter`] and
//! the two result lists a browse screen shows:
//!
//! - [`books`](BrowseSession::books): loaded inventory matching the filter
//! - [`remote_results`](BrowseSession::remote_results): catalog hits shown
//!   as "not available locally" when nothing in the inventory matched
//!
//! Methods take `&mut self`, so overlapping "load more" calls on the same
//! session cannot interleave. Pages are merged by ISBN.

use crate::error::Result;
use core_library::query::{append_unique, dedup_by_isbn, distinct_authors, distinct_genres};
use core_library::repositories::{BookRepository, PageRequest};
use core_library::{Book, BookFilter, FilterMode};
use core_metadata::BookCatalog;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BrowseSession {
    books: Arc<dyn BookRepository>,
    catalog: Arc<dyn BookCatalog>,
    events: EventBus,
    page_size: u32,
    remote_fallback: bool,

    loaded: Vec<Book>,
    cursor: Option<String>,
    has_more: bool,
    started: bool,

    filter: BookFilter,
    displayed: Vec<Book>,
    remote: Vec<Book>,
    last_remote_query: Option<String>,
}

impl BrowseSession {
    pub(crate) fn new(
        books: Arc<dyn BookRepository>,
        catalog: Arc<dyn BookCatalog>,
        events: EventBus,
        page_size: u32,
        remote_fallback: bool,
    ) -> Self {
        Self {
            books,
            catalog,
            events,
            page_size,
            remote_fallback,
            loaded: Vec::new(),
            cursor: None,
            has_more: false,
            started: false,
            filter: BookFilter::default(),
            displayed: Vec::new(),
            remote: Vec::new(),
            last_remote_query: None,
        }
    }

    /// Drop everything loaded and fetch the first page.
    ///
    /// # Returns
    /// Number of books on the first page
    pub async fn load_first(&mut self) -> Result<usize> {
        self.loaded.clear();
        self.cursor = None;
        self.has_more = false;
        self.started = true;
        self.remote.clear();
        self.last_remote_query = None;
        self.fetch(PageRequest::first(self.page_size)).await
    }

    /// Fetch the page after the last loaded key.
    ///
    /// Does nothing once the inventory is exhausted. Starts from the first
    /// page if nothing was loaded yet.
    ///
    /// # Returns
    /// Number of books newly added to the session
    pub async fn load_more(&mut self) -> Result<usize> {
        if !self.started {
            return self.load_first().await;
        }
        let Some(after) = self.cursor.clone().filter(|_| self.has_more) else {
            debug!("No more pages to load");
            return Ok(0);
        };
        self.fetch(PageRequest::after(after, self.page_size)).await
    }

    async fn fetch(&mut self, request: PageRequest) -> Result<usize> {
        let page = self.books.query(request).await?;
        let incoming: Vec<Book> = page
            .items
            .iter()
            .map(|record| record.to_book(&record.isbn))
            .collect();

        let added = append_unique(&mut self.loaded, incoming);
        if page.last_key.is_some() {
            self.cursor = page.last_key;
        }
        self.has_more = page.has_more;
        debug!(added, total = self.loaded.len(), has_more = self.has_more, "Loaded browse page");

        self.events
            .emit(CoreEvent::Library(LibraryEvent::PageLoaded {
                count: added,
                has_more: self.has_more,
            }))
            .ok();

        self.refresh().await;
        Ok(added)
    }

    /// Replace the search text and re-run the search.
    pub async fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
        self.refresh().await;
    }

    /// Switch the searched field.
    ///
    /// Choosing `Author` drops a genre selection and vice versa; `Title`
    /// drops both.
    pub async fn set_mode(&mut self, mode: FilterMode) {
        self.filter.mode = mode;
        match mode {
            FilterMode::Title => {
                self.filter.selected_author = None;
                self.filter.selected_genre = None;
            }
            FilterMode::Author => self.filter.selected_genre = None,
            FilterMode::Genre => self.filter.selected_author = None,
        }
        self.refresh().await;
    }

    pub async fn select_author(&mut self, author: Option<String>) {
        self.filter.selected_author = author;
        self.refresh().await;
    }

    pub async fn select_genre(&mut self, genre: Option<String>) {
        self.filter.selected_genre = genre;
        self.refresh().await;
    }

    /// Recompute both result lists for the current filter.
    ///
    /// When a non-blank query matches nothing loaded, the catalog is asked
    /// once per distinct query. Catalog failures leave the remote list
    /// empty.
    pub async fn refresh(&mut self) {
        self.apply_local();

        let local_hits = self.filter.search(&self.loaded).len();
        let remote_query = self
            .filter
            .remote_query()
            .filter(|_| self.remote_fallback && local_hits == 0);

        let Some(remote_query) = remote_query else {
            self.remote.clear();
            self.last_remote_query = None;
            return;
        };

        if self.last_remote_query.as_deref() != Some(remote_query.as_str()) {
            self.remote = match self.catalog.search(&remote_query).await {
                Ok(books) => dedup_by_isbn(books),
                Err(e) => {
                    warn!(query = %remote_query, error = %e, "Catalog search failed");
                    Vec::new()
                }
            };
            self.last_remote_query = Some(remote_query);
        }

        // Pages loaded after the search may now hold some of the results.
        let local: HashSet<&str> = self.loaded.iter().map(|b| b.isbn.as_str()).collect();
        self.remote.retain(|b| !local.contains(b.isbn.as_str()));
    }

    fn apply_local(&mut self) {
        self.displayed = self.filter.apply(&self.loaded);
    }

    /// Loaded books matching the filter, in key order.
    pub fn books(&self) -> &[Book] {
        &self.displayed
    }

    /// Catalog results for a query with no local match, narrowed by the
    /// current selections.
    pub fn remote_results(&self) -> Vec<Book> {
        self.filter.apply_selection(self.remote.clone())
    }

    /// Every book loaded so far, ignoring the filter.
    pub fn loaded(&self) -> &[Book] {
        &self.loaded
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether a "load more" control should be offered: more pages exist
    /// and no search is active.
    pub fn can_load_more(&self) -> bool {
        self.has_more && !self.filter.is_search()
    }

    pub fn filter(&self) -> &BookFilter {
        &self.filter
    }

    /// Author names for the filter menu.
    pub fn authors(&self) -> Vec<String> {
        distinct_authors(&self.loaded)
    }

    /// Genres for the filter menu.
    pub fn genres(&self) -> Vec<String> {
        distinct_genres(&self.loaded)
    }
}

impl std::fmt::Debug for BrowseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseSession")
            .field("loaded", &self.loaded.len())
            .field("has_more", &self.has_more)
            .field("filter", &self.filter)
            .field("displayed", &self.displayed.len())
            .field("remote", &self.remote.len())
            .finish()
    }
}
