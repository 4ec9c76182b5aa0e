//! User repository trait and realtime database implementation

use crate::error::{LibraryError, Result};
use crate::models::{from_node, UserProfile};
use crate::repositories::{add_to_list, node_path, remove_from_list, USERS_NODE};
use async_trait::async_trait;
use bridge_traits::realtime::{RealtimeDatabase, TransactOutcome};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const MY_BOOKS_FIELD: &str = "my_books";
const SWAPS_FIELD: &str = "swaps";

/// User repository interface
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a profile by uid
    async fn find(&self, uid: &str) -> Result<Option<UserProfile>>;

    /// Create or update the contact fields of a profile
    ///
    /// `my_books` and `swaps` are left untouched.
    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Add an ISBN to the user's `my_books`
    ///
    /// # Returns
    /// - `Ok(true)` if added
    /// - `Ok(false)` if it was already listed
    async fn add_owned_book(&self, uid: &str, isbn: &str) -> Result<bool>;

    /// Remove an ISBN from the user's `my_books`
    async fn remove_owned_book(&self, uid: &str, isbn: &str) -> Result<bool>;

    /// Increment the swap counter
    ///
    /// # Returns
    /// The counter after the increment
    async fn increment_swaps(&self, uid: &str) -> Result<i64>;

    /// Delete the profile node
    ///
    /// # Returns
    /// - `Ok(true)` if a profile was deleted
    /// - `Ok(false)` if none existed
    async fn delete(&self, uid: &str) -> Result<bool>;
}

/// [`UserRepository`] over the `Users` node
pub struct RealtimeUserRepository {
    db: Arc<dyn RealtimeDatabase>,
}

impl RealtimeUserRepository {
    pub fn new(db: Arc<dyn RealtimeDatabase>) -> Self {
        Self { db }
    }
}

fn require_uid(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        return Err(LibraryError::invalid_input("uid", "User id cannot be empty"));
    }
    Ok(())
}

fn counter_value(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl UserRepository for RealtimeUserRepository {
    async fn find(&self, uid: &str) -> Result<Option<UserProfile>> {
        let path = node_path(USERS_NODE, uid)?;
        let Some(node) = self.db.get(&path).await? else {
            return Ok(None);
        };
        let mut profile: UserProfile = from_node(&path.to_string(), node)?;
        if profile.uid.is_empty() {
            profile.uid = uid.to_string();
        }
        Ok(Some(profile))
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        profile
            .validate()
            .map_err(|msg| LibraryError::invalid_input("profile", msg))?;

        let path = node_path(USERS_NODE, &profile.uid)?;
        self.db.update(&path, profile.profile_fields()).await?;
        info!(uid = %profile.uid, "Saved user profile");
        Ok(())
    }

    async fn add_owned_book(&self, uid: &str, isbn: &str) -> Result<bool> {
        require_uid(uid)?;
        let path = node_path(USERS_NODE, uid)?.child(MY_BOOKS_FIELD)?;
        let result = self
            .db
            .transact(&path, &|current| add_to_list(current, isbn))
            .await?;
        Ok(result.committed)
    }

    async fn remove_owned_book(&self, uid: &str, isbn: &str) -> Result<bool> {
        require_uid(uid)?;
        let path = node_path(USERS_NODE, uid)?.child(MY_BOOKS_FIELD)?;
        let result = self
            .db
            .transact(&path, &|current| remove_from_list(current, isbn))
            .await?;
        Ok(result.committed)
    }

    async fn increment_swaps(&self, uid: &str) -> Result<i64> {
        require_uid(uid)?;
        let path = node_path(USERS_NODE, uid)?.child(SWAPS_FIELD)?;
        let result = self
            .db
            .transact(&path, &|current| {
                TransactOutcome::Write(Value::from(counter_value(current) + 1))
            })
            .await?;

        let swaps = counter_value(result.snapshot.as_ref());
        info!(uid = %uid, swaps, "Recorded swap");
        Ok(swaps)
    }

    async fn delete(&self, uid: &str) -> Result<bool> {
        require_uid(uid)?;
        let path = node_path(USERS_NODE, uid)?;
        let result = self
            .db
            .transact(&path, &|current| match current {
                Some(_) => TransactOutcome::Delete,
                None => TransactOutcome::Abort,
            })
            .await?;
        if result.committed {
            info!(uid = %uid, "Deleted user profile");
        }
        Ok(result.committed)
    }
}
