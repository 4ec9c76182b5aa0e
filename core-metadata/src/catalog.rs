//! Book catalog abstraction
//!
//! The service layer talks to the catalog only through [`BookCatalog`], so
//! tests and alternative providers can stand in for Google Books.

use crate::error::Result;
use async_trait::async_trait;
use core_library::models::Book;
use serde::{Deserialize, Serialize};

pub const NO_DESCRIPTION: &str = "No description available.";
pub const NO_COVER: &str = "No book cover available";

/// Message shown when a lookup finds nothing.
pub fn no_details_message(isbn: &str) -> String {
    format!("No details found for ISBN: {isbn}")
}

/// Everything a details screen shows for one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDetails {
    pub book: Book,
    pub description: String,
}

impl VolumeDetails {
    pub fn new(book: Book, description: Option<&str>) -> Self {
        let description = match description.map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => NO_DESCRIPTION.to_string(),
        };
        Self { book, description }
    }

    /// Cover URL, or the placeholder text when there is none.
    pub fn cover_or_placeholder(&self) -> &str {
        if self.book.has_cover() {
            &self.book.cover_url
        } else {
            NO_COVER
        }
    }
}

/// Remote book catalog
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Look up a single volume by ISBN
    ///
    /// # Returns
    /// - `Ok(Some(details))` if the catalog knows the ISBN
    /// - `Ok(None)` if it does not
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<VolumeDetails>>;

    /// Keyword search
    ///
    /// `query` is passed through as-is, including field prefixes such as
    /// `inauthor:` or `subject:`.
    async fn search(&self, query: &str) -> Result<Vec<Book>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_fallbacks() {
        let details = VolumeDetails::new(Book::new("111"), Some("   "));
        assert_eq!(details.description, NO_DESCRIPTION);
        assert_eq!(details.cover_or_placeholder(), NO_COVER);
        assert_eq!(no_details_message("111"), "No details found for ISBN: 111");
    }

    #[test]
    fn test_details_keep_values() {
        let book = Book::new("111").with_cover_url("https://covers.example/1.jpg");
        let details = VolumeDetails::new(book, Some("A desert planet."));
        assert_eq!(details.description, "A desert planet.");
        assert_eq!(details.cover_or_placeholder(), "https://covers.example/1.jpg");
    }
}
