//! Search and filtering over loaded books.
//!
//! Filtering is a plain case-insensitive substring match on one field,
//! chosen by [`FilterMode`]. There is no ranking: results keep the order of
//! the input. Value selections (one author, one genre) narrow the result
//! further and also apply to remote catalog results.

use crate::models::{Book, UNKNOWN_GENRE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Field a search query is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Title,
    Author,
    Genre,
}

impl FilterMode {
    pub fn field<'a>(&self, book: &'a Book) -> &'a str {
        match self {
            FilterMode::Title => &book.title,
            FilterMode::Author => &book.authors,
            FilterMode::Genre => &book.genre,
        }
    }

    /// Catalog keyword query for an already normalized search string.
    ///
    /// ```
    /// use core_library::query::FilterMode;
    ///
    /// assert_eq!(FilterMode::Title.remote_query("dune"), "dune");
    /// assert_eq!(FilterMode::Author.remote_query("herbert"), "inauthor:herbert");
    /// assert_eq!(FilterMode::Genre.remote_query("fantasy"), "subject:fantasy");
    /// ```
    pub fn remote_query(&self, query: &str) -> String {
        match self {
            FilterMode::Title => query.to_string(),
            FilterMode::Author => format!("inauthor:{query}"),
            FilterMode::Genre => format!("subject:{query}"),
        }
    }
}

/// Trim and lowercase a raw search string.
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Current search and selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFilter {
    /// Raw query as typed.
    pub query: String,
    pub mode: FilterMode,
    /// Keep only books whose authors contain this name.
    pub selected_author: Option<String>,
    /// Keep only books with exactly this genre, ignoring case.
    pub selected_genre: Option<String>,
}

impl BookFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.selected_author = Some(author.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.selected_genre = Some(genre.into());
        self
    }

    pub fn normalized_query(&self) -> String {
        normalize_query(&self.query)
    }

    /// Whether a non-blank query is set.
    pub fn is_search(&self) -> bool {
        !self.query.trim().is_empty()
    }

    pub fn matches_query(&self, book: &Book) -> bool {
        let query = self.normalized_query();
        query.is_empty() || self.mode.field(book).to_lowercase().contains(&query)
    }

    pub fn matches_selection(&self, book: &Book) -> bool {
        let author_ok = self
            .selected_author
            .as_deref()
            .map_or(true, |author| book.authors.contains(author));
        let genre_ok = self
            .selected_genre
            .as_deref()
            .map_or(true, |genre| book.genre.to_lowercase() == genre.to_lowercase());
        author_ok && genre_ok
    }

    pub fn matches(&self, book: &Book) -> bool {
        self.matches_query(book) && self.matches_selection(book)
    }

    /// Books matching the query only, before selections.
    pub fn search<'a>(&self, books: &'a [Book]) -> Vec<&'a Book> {
        books.iter().filter(|b| self.matches_query(b)).collect()
    }

    /// Books matching the query and the selections, in input order.
    pub fn apply(&self, books: &[Book]) -> Vec<Book> {
        books.iter().filter(|b| self.matches(b)).cloned().collect()
    }

    /// Selections only. Used on remote results, which already matched the
    /// query on the catalog side.
    pub fn apply_selection(&self, books: Vec<Book>) -> Vec<Book> {
        books
            .into_iter()
            .filter(|b| self.matches_selection(b))
            .collect()
    }

    /// Catalog query to run when nothing matched locally. `None` for a
    /// blank query.
    pub fn remote_query(&self) -> Option<String> {
        self.is_search()
            .then(|| self.mode.remote_query(&self.normalized_query()))
    }
}

/// Keep the first book for each ISBN, preserving order.
pub fn dedup_by_isbn(books: impl IntoIterator<Item = Book>) -> Vec<Book> {
    let mut merged = Vec::new();
    append_unique(&mut merged, books);
    merged
}

/// Append books whose ISBN is not already in `target`.
///
/// # Returns
/// Number of books appended
pub fn append_unique(target: &mut Vec<Book>, incoming: impl IntoIterator<Item = Book>) -> usize {
    let mut seen: HashSet<String> = target.iter().map(|b| b.isbn.clone()).collect();
    let before = target.len();
    for book in incoming {
        if seen.insert(book.isbn.clone()) {
            target.push(book);
        }
    }
    target.len() - before
}

/// Sorted individual author names across `books`, for filter menus.
pub fn distinct_authors(books: &[Book]) -> Vec<String> {
    books
        .iter()
        .flat_map(|b| b.author_names())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted genres across `books`, without the unknown placeholder.
pub fn distinct_genres(books: &[Book]) -> Vec<String> {
    books
        .iter()
        .map(|b| b.genre.trim())
        .filter(|g| !g.is_empty() && *g != UNKNOWN_GENRE)
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
