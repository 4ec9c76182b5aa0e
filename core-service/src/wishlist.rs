//! Wishlist operations and matching against the shared inventory.

use crate::error::Result;
use core_library::repositories::{BookRepository, UserRepository, WishlistRepository};
use core_library::{normalize_book_key, Book};
use core_metadata::BookCatalog;
use core_runtime::events::{CoreEvent, EventBus, WishlistEvent};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A wished-for book that someone else currently lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistMatch {
    pub book: Book,
    /// Owners other than the wishing user.
    pub owners: Vec<String>,
}

/// One of the user's books that other users wish for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInterest {
    pub isbn: String,
    pub wishers: Vec<String>,
}

#[derive(Clone)]
pub struct WishlistService {
    wishlist: Arc<dyn WishlistRepository>,
    books: Arc<dyn BookRepository>,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn BookCatalog>,
    events: EventBus,
}

impl WishlistService {
    pub(crate) fn new(
        wishlist: Arc<dyn WishlistRepository>,
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn BookCatalog>,
        events: EventBus,
    ) -> Self {
        Self {
            wishlist,
            books,
            users,
            catalog,
            events,
        }
    }

    /// Scanned ISBN-10 values are stored in their ISBN-13 form so they
    /// meet listings of the same book.
    ///
    /// # Returns
    /// `false` if the book was already on the user's wishlist
    pub async fn add(&self, uid: &str, isbn: &str) -> Result<bool> {
        let isbn = normalize_book_key(isbn)?;
        let added = self.wishlist.add(&isbn, uid).await?;
        if added {
            self.events
                .emit(CoreEvent::Wishlist(WishlistEvent::Added {
                    isbn,
                    uid: uid.to_string(),
                }))
                .ok();
        }
        Ok(added)
    }

    pub async fn remove(&self, uid: &str, isbn: &str) -> Result<bool> {
        let isbn = normalize_book_key(isbn)?;
        let removed = self.wishlist.remove(&isbn, uid).await?;
        if removed {
            self.events
                .emit(CoreEvent::Wishlist(WishlistEvent::Removed {
                    isbn,
                    uid: uid.to_string(),
                }))
                .ok();
        }
        Ok(removed)
    }

    pub async fn isbns(&self, uid: &str) -> Result<Vec<String>> {
        Ok(self.wishlist.isbns_for(uid).await?)
    }

    /// The user's wishlist with catalog details. Entries the catalog
    /// cannot resolve are skipped.
    pub async fn resolve(&self, uid: &str) -> Result<Vec<Book>> {
        let isbns = self.wishlist.isbns_for(uid).await?;
        let lookups = join_all(isbns.iter().map(|isbn| self.catalog.lookup_isbn(isbn))).await;

        Ok(isbns
            .iter()
            .zip(lookups)
            .filter_map(|(isbn, lookup)| match lookup {
                Ok(Some(details)) => Some(details.book),
                Ok(None) => {
                    debug!(isbn = %isbn, "Wishlist entry not in catalog");
                    None
                }
                Err(e) => {
                    warn!(isbn = %isbn, error = %e, "Wishlist lookup failed");
                    None
                }
            })
            .collect())
    }

    /// Wished-for books currently listed by other users.
    pub async fn matches(&self, uid: &str) -> Result<Vec<WishlistMatch>> {
        let isbns = self.wishlist.isbns_for(uid).await?;
        let mut matches = Vec::new();
        for isbn in isbns {
            let Some(record) = self.books.find_by_isbn(&isbn).await? else {
                continue;
            };
            let owners: Vec<String> = record
                .owners
                .iter()
                .filter(|owner| owner.as_str() != uid)
                .cloned()
                .collect();
            if !owners.is_empty() {
                matches.push(WishlistMatch {
                    book: record.to_book(&isbn),
                    owners,
                });
            }
        }
        Ok(matches)
    }

    /// The user's books that other users wish for.
    pub async fn interest(&self, uid: &str) -> Result<Vec<BookInterest>> {
        let Some(profile) = self.users.find(uid).await? else {
            return Ok(Vec::new());
        };

        let mut interest = Vec::new();
        for isbn in profile.my_books {
            let wishers: Vec<String> = self
                .wishlist
                .wishers(&isbn)
                .await?
                .into_iter()
                .filter(|wisher| wisher != uid)
                .collect();
            if !wishers.is_empty() && !interest.iter().any(|i: &BookInterest| i.isbn == isbn) {
                interest.push(BookInterest { isbn, wishers });
            }
        }
        Ok(interest)
    }
}
