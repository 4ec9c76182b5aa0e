//! Inventory operations: listing, unlisting, swaps, and account removal.
//!
//! Each operation touches more than one node (`Books/{isbn}` and
//! `Users/{uid}`). Every node is updated atomically on its own; the steps
//! of one operation run one after another and are not atomic as a whole.

use crate::error::{CoreError, Result};
use core_library::models::Isbn;
use core_library::repositories::{BookRepository, OwnerRemoval, UserRepository, WishlistRepository};
use core_library::{normalize_book_key, Book};
use core_metadata::BookCatalog;
use core_runtime::events::{AccountEvent, CoreEvent, EventBus, LibraryEvent, SwapEvent};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of listing a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedBook {
    pub book: Book,
    /// The user was not an owner before.
    pub newly_listed: bool,
}

/// What [`InventoryService::delete_account`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountDeletion {
    pub profile_deleted: bool,
    pub books_released: usize,
    pub wishlists_left: usize,
}

#[derive(Clone)]
pub struct InventoryService {
    books: Arc<dyn BookRepository>,
    users: Arc<dyn UserRepository>,
    wishlist: Arc<dyn WishlistRepository>,
    catalog: Arc<dyn BookCatalog>,
    events: EventBus,
}

impl InventoryService {
    pub(crate) fn new(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        wishlist: Arc<dyn WishlistRepository>,
        catalog: Arc<dyn BookCatalog>,
        events: EventBus,
    ) -> Self {
        Self {
            books,
            users,
            wishlist,
            catalog,
            events,
        }
    }

    /// List a scanned ISBN for `uid`.
    ///
    /// The ISBN is validated and normalized first. Book details come from
    /// the catalog; if the lookup fails or finds nothing the book is listed
    /// with default details.
    pub async fn list_book(&self, uid: &str, scanned_isbn: &str) -> Result<ListedBook> {
        let isbn = Isbn::parse(scanned_isbn)?;
        let book = match self.catalog.lookup_isbn(isbn.as_str()).await {
            Ok(Some(details)) => details.book,
            Ok(None) => {
                warn!(isbn = %isbn, "Catalog has no details, listing with defaults");
                Book::new(isbn.as_str())
            }
            Err(e) => {
                warn!(isbn = %isbn, error = %e, "Catalog lookup failed, listing with defaults");
                Book::new(isbn.as_str())
            }
        };
        self.list_known_book(uid, book).await
    }

    /// List a book whose details the caller already has, e.g. from a
    /// details screen.
    pub async fn list_known_book(&self, uid: &str, book: Book) -> Result<ListedBook> {
        let newly_listed = self.books.add_owner(&book, uid).await?;
        self.users.add_owned_book(uid, &book.isbn).await?;

        if newly_listed {
            info!(isbn = %book.isbn, uid = %uid, "Book listed");
            self.events
                .emit(CoreEvent::Library(LibraryEvent::BookListed {
                    isbn: book.isbn.clone(),
                    uid: uid.to_string(),
                }))
                .ok();
        }
        Ok(ListedBook { book, newly_listed })
    }

    /// Stop owning a book. The inventory entry is removed once its last
    /// owner leaves.
    pub async fn unlist_book(&self, uid: &str, isbn: &str) -> Result<OwnerRemoval> {
        let key = normalize_book_key(isbn)?;
        let isbn = key.as_str();
        let removal = self.books.remove_owner(isbn, uid).await?;
        let from_my_books = self.users.remove_owned_book(uid, isbn).await?;

        if removal.removed || from_my_books {
            self.events
                .emit(CoreEvent::Library(LibraryEvent::BookUnlisted {
                    isbn: isbn.to_string(),
                    uid: uid.to_string(),
                    entry_removed: removal.entry_deleted,
                }))
                .ok();
        }
        Ok(removal)
    }

    /// Record a completed swap: the book leaves the user's inventory and
    /// the swap counter goes up.
    ///
    /// # Returns
    /// The user's swap count after this swap
    ///
    /// # Errors
    /// `InvalidRequest` if the user does not own the book, `Library` if
    /// `isbn` is neither a valid ISBN nor a fallback id
    pub async fn complete_swap(&self, uid: &str, isbn: &str) -> Result<i64> {
        let key = normalize_book_key(isbn)?;
        let isbn = key.as_str();
        let removal = self.books.remove_owner(isbn, uid).await?;
        let from_my_books = self.users.remove_owned_book(uid, isbn).await?;
        if !removal.removed && !from_my_books {
            return Err(CoreError::InvalidRequest(format!(
                "User {uid} does not own book {isbn}"
            )));
        }

        let total_swaps = self.users.increment_swaps(uid).await?;
        info!(isbn = %isbn, uid = %uid, total_swaps, "Swap completed");

        self.events
            .emit(CoreEvent::Library(LibraryEvent::BookUnlisted {
                isbn: isbn.to_string(),
                uid: uid.to_string(),
                entry_removed: removal.entry_deleted,
            }))
            .ok();
        self.events
            .emit(CoreEvent::Swap(SwapEvent::Completed {
                uid: uid.to_string(),
                isbn: isbn.to_string(),
                total_swaps,
            }))
            .ok();
        Ok(total_swaps)
    }

    pub async fn swap_count(&self, uid: &str) -> Result<i64> {
        Ok(self
            .users
            .find(uid)
            .await?
            .map(|profile| profile.swaps)
            .unwrap_or(0))
    }

    /// Books in the user's `my_books`, each listed once.
    ///
    /// Details come from the inventory entry when there is one, otherwise
    /// from the catalog. ISBNs neither source knows are skipped.
    pub async fn my_books(&self, uid: &str) -> Result<Vec<Book>> {
        let Some(profile) = self.users.find(uid).await? else {
            return Ok(Vec::new());
        };

        let mut isbns = profile.my_books;
        let mut seen = std::collections::HashSet::new();
        isbns.retain(|isbn| seen.insert(isbn.clone()));

        let resolved = join_all(isbns.iter().map(|isbn| self.resolve(isbn))).await;
        Ok(resolved.into_iter().flatten().collect())
    }

    async fn resolve(&self, isbn: &str) -> Option<Book> {
        match self.books.find_by_isbn(isbn).await {
            Ok(Some(record)) => return Some(record.to_book(isbn)),
            Ok(None) => {}
            Err(e) => warn!(isbn = %isbn, error = %e, "Inventory read failed, trying catalog"),
        }
        match self.catalog.lookup_isbn(isbn).await {
            Ok(Some(details)) => Some(details.book),
            Ok(None) => {
                warn!(isbn = %isbn, "No details for owned book");
                None
            }
            Err(e) => {
                warn!(isbn = %isbn, error = %e, "Catalog lookup failed for owned book");
                None
            }
        }
    }

    /// Remove the profile and release the user from every book and
    /// wishlist entry.
    pub async fn delete_account(&self, uid: &str) -> Result<AccountDeletion> {
        let profile_deleted = self.users.delete(uid).await?;
        let released = self.books.release_owner(uid).await?;
        let wishlists_left = self.wishlist.remove_user(uid).await?;

        let deletion = AccountDeletion {
            profile_deleted,
            books_released: released.len(),
            wishlists_left,
        };
        info!(
            uid = %uid,
            books_released = deletion.books_released,
            wishlists_left,
            "Account deleted"
        );
        self.events
            .emit(CoreEvent::Account(AccountEvent::Deleted {
                uid: uid.to_string(),
                books_released: deletion.books_released,
            }))
            .ok();
        Ok(deletion)
    }
}
