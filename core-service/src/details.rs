//! Book details screen content.

use core_library::Book;
use core_metadata::catalog::{no_details_message, VolumeDetails, NO_COVER, NO_DESCRIPTION};
use serde::{Deserialize, Serialize};

/// What a details screen renders for one ISBN.
///
/// Lookups never fail from the screen's point of view: a missing volume or
/// a catalog error turns into [`BookDetailsView::not_found`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetailsView {
    pub isbn: String,
    /// `None` when the catalog had nothing for the ISBN.
    pub book: Option<Book>,
    pub description: String,
    /// Cover URL, or placeholder text when there is none.
    pub cover: String,
    /// Message to show instead of details.
    pub message: Option<String>,
}

impl BookDetailsView {
    pub fn found(details: VolumeDetails) -> Self {
        Self {
            isbn: details.book.isbn.clone(),
            cover: details.cover_or_placeholder().to_string(),
            description: details.description,
            book: Some(details.book),
            message: None,
        }
    }

    pub fn not_found(isbn: &str) -> Self {
        Self {
            isbn: isbn.to_string(),
            book: None,
            description: NO_DESCRIPTION.to_string(),
            cover: NO_COVER.to_string(),
            message: Some(no_details_message(isbn)),
        }
    }

    pub fn is_found(&self) -> bool {
        self.book.is_some()
    }
}
