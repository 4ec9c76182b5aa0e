//! Book repository trait and realtime database implementation

use crate::error::{LibraryError, Result};
use crate::models::{from_node, string_list, Book, BookRecord};
use crate::repositories::{
    add_member, node_path, remove_member, Page, PageRequest, BOOKS_NODE, MEMBERS_FIELD,
};
use async_trait::async_trait;
use bridge_traits::realtime::{sorted_children, ChildQuery, DbPath, RealtimeDatabase};
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of removing an owner from a book entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnerRemoval {
    /// The uid was an owner and has been removed.
    pub removed: bool,
    /// The uid was the last owner, so the entry itself is gone.
    pub entry_deleted: bool,
}

/// Book repository interface for the shared inventory
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find a book entry by ISBN
    ///
    /// # Returns
    /// - `Ok(Some(record))` if listed
    /// - `Ok(None)` if no entry exists
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>>;

    /// Query entries in key order
    ///
    /// # Arguments
    /// * `request` - Cursor and page size
    async fn query(&self, request: PageRequest) -> Result<Page<BookRecord>>;

    /// Every entry, in key order
    async fn list_all(&self) -> Result<Vec<BookRecord>>;

    /// Owner uids of a book, empty when the book is not listed
    async fn owners(&self, isbn: &str) -> Result<Vec<String>>;

    /// Add `uid` to the owners of `book`, creating the entry if needed
    ///
    /// # Returns
    /// - `Ok(true)` if the uid was added
    /// - `Ok(false)` if it was already an owner
    ///
    /// # Errors
    /// Returns error if the book fails validation or the write fails
    async fn add_owner(&self, book: &Book, uid: &str) -> Result<bool>;

    /// Remove `uid` from the owners of a book, deleting the entry when no
    /// owners remain
    async fn remove_owner(&self, isbn: &str, uid: &str) -> Result<OwnerRemoval>;

    /// Remove `uid` from every entry it owns
    ///
    /// # Returns
    /// ISBNs the uid was released from
    async fn release_owner(&self, uid: &str) -> Result<Vec<String>>;
}

/// [`BookRepository`] over the `Books` node
pub struct RealtimeBookRepository {
    db: Arc<dyn RealtimeDatabase>,
}

impl RealtimeBookRepository {
    pub fn new(db: Arc<dyn RealtimeDatabase>) -> Self {
        Self { db }
    }

    fn root() -> Result<DbPath> {
        Ok(DbPath::parse(BOOKS_NODE)?)
    }

    fn parse_record(key: &str, node: Value) -> Result<BookRecord> {
        let mut record: BookRecord = from_node(&format!("{BOOKS_NODE}/{key}"), node)?;
        if record.isbn.trim().is_empty() {
            record.isbn = key.to_string();
        }
        Ok(record)
    }

    /// Parse listed entries, skipping ones that cannot be read so one bad
    /// node does not hide the rest of the inventory.
    fn parse_rows(rows: Vec<(String, Value)>) -> Vec<BookRecord> {
        rows.into_iter()
            .filter_map(|(key, node)| match Self::parse_record(&key, node) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(isbn = %key, error = %e, "Skipping unreadable book entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl BookRepository for RealtimeBookRepository {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>> {
        let path = node_path(BOOKS_NODE, isbn)?;
        match self.db.get(&path).await? {
            Some(node) => Ok(Some(Self::parse_record(isbn, node)?)),
            None => Ok(None),
        }
    }

    async fn query(&self, request: PageRequest) -> Result<Page<BookRecord>> {
        let mut query = ChildQuery::by_key().limit_to_first(request.fetch_limit());
        if let Some(after) = &request.start_after {
            query = query.start_after(after.clone());
        }

        let rows = self.db.query_children(&Self::root()?, &query).await?;
        debug!(
            start_after = ?request.start_after,
            fetched = rows.len(),
            "Queried book page"
        );

        let page = Page::from_lookahead(
            rows.into_iter().map(|row| (row.0.clone(), row)).collect(),
            &request,
        );
        Ok(Page {
            items: Self::parse_rows(page.items),
            last_key: page.last_key,
            has_more: page.has_more,
        })
    }

    async fn list_all(&self) -> Result<Vec<BookRecord>> {
        let rows = self
            .db
            .get(&Self::root()?)
            .await?
            .map(sorted_children)
            .unwrap_or_default();
        Ok(Self::parse_rows(rows))
    }

    async fn owners(&self, isbn: &str) -> Result<Vec<String>> {
        let path = node_path(BOOKS_NODE, isbn)?.child(MEMBERS_FIELD)?;
        Ok(string_list(self.db.get(&path).await?.as_ref()))
    }

    async fn add_owner(&self, book: &Book, uid: &str) -> Result<bool> {
        book.validate()
            .map_err(|msg| LibraryError::invalid_input("book", msg))?;
        if uid.trim().is_empty() {
            return Err(LibraryError::invalid_input("uid", "Owner uid cannot be empty"));
        }

        let template = match BookRecord::from_book(book, Vec::new()).to_value() {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let path = node_path(BOOKS_NODE, &book.isbn)?;
        let result = self
            .db
            .transact(&path, &|current| add_member(current, uid, &template))
            .await?;

        let added = result.committed;
        if added {
            info!(isbn = %book.isbn, uid = %uid, "Added book owner");
        }
        Ok(added)
    }

    async fn remove_owner(&self, isbn: &str, uid: &str) -> Result<OwnerRemoval> {
        let path = node_path(BOOKS_NODE, isbn)?;
        let result = self
            .db
            .transact(&path, &|current| remove_member(current, uid))
            .await?;

        let removal = OwnerRemoval {
            removed: result.committed,
            entry_deleted: result.committed && result.snapshot.is_none(),
        };
        if removal.removed {
            info!(
                isbn = %isbn,
                uid = %uid,
                entry_deleted = removal.entry_deleted,
                "Removed book owner"
            );
        }
        Ok(removal)
    }

    async fn release_owner(&self, uid: &str) -> Result<Vec<String>> {
        let owned: Vec<String> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|record| record.is_owned_by(uid))
            .map(|record| record.isbn)
            .collect();

        let removals = try_join_all(owned.iter().map(|isbn| self.remove_owner(isbn, uid))).await?;
        Ok(owned
            .into_iter()
            .zip(removals)
            .filter(|(_, removal)| removal.removed)
            .map(|(isbn, _)| isbn)
            .collect())
    }
}
