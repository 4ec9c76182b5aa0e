//! Wishlist repository trait and realtime database implementation

use crate::error::{LibraryError, Result};
use crate::models::{from_node, string_list, WishlistRecord};
use crate::repositories::{add_member, node_path, remove_member, MEMBERS_FIELD, WISHLIST_NODE};
use async_trait::async_trait;
use bridge_traits::realtime::{sorted_children, DbPath, RealtimeDatabase};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Wishlist repository interface
///
/// Entries are keyed by ISBN and hold the uids of every user who wants
/// the book.
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    /// Add `uid` to the wishers of `isbn`
    ///
    /// # Returns
    /// - `Ok(true)` if added
    /// - `Ok(false)` if the user already wished for it
    async fn add(&self, isbn: &str, uid: &str) -> Result<bool>;

    /// Remove `uid` from the wishers of `isbn`, deleting the entry when
    /// nobody is left
    async fn remove(&self, isbn: &str, uid: &str) -> Result<bool>;

    /// Uids wishing for `isbn`
    async fn wishers(&self, isbn: &str) -> Result<Vec<String>>;

    /// Every entry, in key order
    async fn list_all(&self) -> Result<Vec<WishlistRecord>>;

    /// ISBNs `uid` wishes for, in key order
    async fn isbns_for(&self, uid: &str) -> Result<Vec<String>>;

    /// Remove `uid` from every entry
    ///
    /// # Returns
    /// Number of entries the uid was removed from
    async fn remove_user(&self, uid: &str) -> Result<usize>;
}

/// [`WishlistRepository`] over the `Wishlist` node
pub struct RealtimeWishlistRepository {
    db: Arc<dyn RealtimeDatabase>,
}

impl RealtimeWishlistRepository {
    pub fn new(db: Arc<dyn RealtimeDatabase>) -> Self {
        Self { db }
    }
}

fn require_ids(isbn: &str, uid: &str) -> Result<()> {
    if isbn.trim().is_empty() {
        return Err(LibraryError::invalid_input("isbn", "ISBN cannot be empty"));
    }
    if uid.trim().is_empty() {
        return Err(LibraryError::invalid_input("uid", "User id cannot be empty"));
    }
    Ok(())
}

#[async_trait]
impl WishlistRepository for RealtimeWishlistRepository {
    async fn add(&self, isbn: &str, uid: &str) -> Result<bool> {
        require_ids(isbn, uid)?;
        let mut template = Map::new();
        template.insert("isbn".to_string(), Value::String(isbn.to_string()));

        let path = node_path(WISHLIST_NODE, isbn)?;
        let result = self
            .db
            .transact(&path, &|current| add_member(current, uid, &template))
            .await?;
        if result.committed {
            info!(isbn = %isbn, uid = %uid, "Added to wishlist");
        }
        Ok(result.committed)
    }

    async fn remove(&self, isbn: &str, uid: &str) -> Result<bool> {
        require_ids(isbn, uid)?;
        let path = node_path(WISHLIST_NODE, isbn)?;
        let result = self
            .db
            .transact(&path, &|current| remove_member(current, uid))
            .await?;
        if result.committed {
            info!(isbn = %isbn, uid = %uid, "Removed from wishlist");
        }
        Ok(result.committed)
    }

    async fn wishers(&self, isbn: &str) -> Result<Vec<String>> {
        let path = node_path(WISHLIST_NODE, isbn)?.child(MEMBERS_FIELD)?;
        Ok(string_list(self.db.get(&path).await?.as_ref()))
    }

    async fn list_all(&self) -> Result<Vec<WishlistRecord>> {
        let rows = self
            .db
            .get(&DbPath::parse(WISHLIST_NODE)?)
            .await?
            .map(sorted_children)
            .unwrap_or_default();

        Ok(rows
            .into_iter()
            .filter_map(|(key, node)| {
                match from_node::<WishlistRecord>(&format!("{WISHLIST_NODE}/{key}"), node) {
                    Ok(mut record) => {
                        if record.isbn.trim().is_empty() {
                            record.isbn = key;
                        }
                        Some(record)
                    }
                    Err(e) => {
                        warn!(isbn = %key, error = %e, "Skipping unreadable wishlist entry");
                        None
                    }
                }
            })
            .collect())
    }

    async fn isbns_for(&self, uid: &str) -> Result<Vec<String>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|record| record.users.iter().any(|u| u == uid))
            .map(|record| record.isbn)
            .collect())
    }

    async fn remove_user(&self, uid: &str) -> Result<usize> {
        let isbns = self.isbns_for(uid).await?;
        let removed = try_join_all(isbns.iter().map(|isbn| self.remove(isbn, uid))).await?;
        Ok(removed.into_iter().filter(|r| *r).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::InMemoryRealtimeDatabase;
    use serde_json::json;

    fn repo_with(data: Value) -> (Arc<InMemoryRealtimeDatabase>, RealtimeWishlistRepository) {
        let db = Arc::new(InMemoryRealtimeDatabase::with_data(data));
        let repo = RealtimeWishlistRepository::new(db.clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_add_creates_entry_and_dedups() {
        let (db, repo) = repo_with(Value::Null);

        assert!(repo.add("111", "u1").await.unwrap());
        assert!(!repo.add("111", "u1").await.unwrap());
        assert!(repo.add("111", "u2").await.unwrap());

        assert_eq!(
            db.snapshot().await,
            json!({ "Wishlist": { "111": { "isbn": "111", "uid": ["u1", "u2"] } } })
        );
    }

    #[tokio::test]
    async fn test_remove_last_wisher_deletes_entry() {
        let (db, repo) = repo_with(json!({
            "Wishlist": { "111": { "isbn": "111", "uid": ["u1"] } }
        }));

        assert!(!repo.remove("111", "u2").await.unwrap());
        assert!(repo.remove("111", "u1").await.unwrap());
        assert_eq!(db.snapshot().await, Value::Null);
    }

    #[tokio::test]
    async fn test_isbns_for_user() {
        let (_, repo) = repo_with(json!({
            "Wishlist": {
                "333": { "uid": ["u1"] },
                "111": { "isbn": "111", "uid": ["u1", "u2"] },
                "222": { "isbn": "222", "uid": "u2" }
            }
        }));

        assert_eq!(repo.isbns_for("u1").await.unwrap(), vec!["111", "333"]);
        assert_eq!(repo.wishers("222").await.unwrap(), vec!["u2"]);
        assert!(repo.wishers("999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_user_everywhere() {
        let (_, repo) = repo_with(json!({
            "Wishlist": {
                "111": { "uid": ["u1", "u2"] },
                "222": { "uid": ["u1"] }
            }
        }));

        assert_eq!(repo.remove_user("u1").await.unwrap(), 2);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
        assert_eq!(repo.isbns_for("u1").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_empty_ids_rejected() {
        let (_, repo) = repo_with(Value::Null);
        assert!(repo.add("", "u1").await.is_err());
        assert!(repo.remove("111", "").await.is_err());
    }
}
