//! # Repository Pattern Implementation
//!
//! Repository traits over the three top-level nodes of the realtime
//! database, each with an implementation on top of
//! [`RealtimeDatabase`](bridge_traits::realtime::RealtimeDatabase).
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - `Realtime*` implementations read and write JSON nodes
//! - Every read-modify-write of a single node goes through
//!   `RealtimeDatabase::transact`, so concurrent writers never drop an
//!   owner, a wishlist entry or a swap
//! - Pagination is supported via the `Page<T>` cursor wrapper
//!
//! ## Available Repositories
//!
//! - `BookRepository` - `Books/{isbn}`: shared inventory and owners
//! - `UserRepository` - `Users/{uid}`: profiles, owned books, swap counters
//! - `WishlistRepository` - `Wishlist/{isbn}`: who wants which book

pub mod book;
pub mod pagination;
pub mod user;
pub mod wishlist;

pub use book::{BookRepository, OwnerRemoval, RealtimeBookRepository};
pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE};
pub use user::{RealtimeUserRepository, UserRepository};
pub use wishlist::{RealtimeWishlistRepository, WishlistRepository};

use crate::error::Result;
use crate::models::string_list;
use bridge_traits::realtime::{DbPath, TransactOutcome};
use serde_json::{Map, Value};

pub(crate) const BOOKS_NODE: &str = "Books";
pub(crate) const USERS_NODE: &str = "Users";
pub(crate) const WISHLIST_NODE: &str = "Wishlist";

/// Field holding the member uids of a `Books` or `Wishlist` entry.
pub(crate) const MEMBERS_FIELD: &str = "uid";

pub(crate) fn node_path(root: &str, key: &str) -> Result<DbPath> {
    Ok(DbPath::parse(root)?.child(key)?)
}

/// Append `item` to a stored list. Aborts when it is already present.
pub(crate) fn add_to_list(current: Option<&Value>, item: &str) -> TransactOutcome {
    let mut items = string_list(current);
    if items.iter().any(|existing| existing == item) {
        return TransactOutcome::Abort;
    }
    items.push(item.to_string());
    TransactOutcome::Write(Value::from(items))
}

/// Remove `item` from a stored list, deleting the list once empty.
pub(crate) fn remove_from_list(current: Option<&Value>, item: &str) -> TransactOutcome {
    let mut items = string_list(current);
    let before = items.len();
    items.retain(|existing| existing != item);
    if items.len() == before {
        TransactOutcome::Abort
    } else if items.is_empty() {
        TransactOutcome::Delete
    } else {
        TransactOutcome::Write(Value::from(items))
    }
}

/// Add `uid` to the member list of an entry node. A missing entry is
/// created from `template`; missing descriptive fields on an existing
/// entry are filled from it.
pub(crate) fn add_member(
    current: Option<&Value>,
    uid: &str,
    template: &Map<String, Value>,
) -> TransactOutcome {
    let mut node = match current {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let TransactOutcome::Write(members) = add_to_list(node.get(MEMBERS_FIELD), uid) else {
        return TransactOutcome::Abort;
    };
    for (key, value) in template {
        if key != MEMBERS_FIELD && !node.contains_key(key) {
            node.insert(key.clone(), value.clone());
        }
    }
    node.insert(MEMBERS_FIELD.to_string(), members);
    TransactOutcome::Write(Value::Object(node))
}

/// Remove `uid` from an entry's member list. The entry is deleted when
/// its last member leaves.
pub(crate) fn remove_member(current: Option<&Value>, uid: &str) -> TransactOutcome {
    let Some(Value::Object(map)) = current else {
        return TransactOutcome::Abort;
    };
    match remove_from_list(map.get(MEMBERS_FIELD), uid) {
        TransactOutcome::Write(list) => {
            let mut node = map.clone();
            node.insert(MEMBERS_FIELD.to_string(), list);
            TransactOutcome::Write(Value::Object(node))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Map<String, Value> {
        match json!({ "isbn": "111", "title": "Dune" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_add_to_list_dedups() {
        let current = json!(["111"]);
        assert_eq!(add_to_list(Some(&current), "111"), TransactOutcome::Abort);
        assert_eq!(
            add_to_list(Some(&current), "222"),
            TransactOutcome::Write(json!(["111", "222"]))
        );
        assert_eq!(
            add_to_list(None, "111"),
            TransactOutcome::Write(json!(["111"]))
        );
    }

    #[test]
    fn test_remove_from_list() {
        let current = json!(["111", "222"]);
        assert_eq!(
            remove_from_list(Some(&current), "111"),
            TransactOutcome::Write(json!(["222"]))
        );
        assert_eq!(
            remove_from_list(Some(&json!(["111"])), "111"),
            TransactOutcome::Delete
        );
        assert_eq!(remove_from_list(Some(&current), "999"), TransactOutcome::Abort);
        assert_eq!(remove_from_list(None, "111"), TransactOutcome::Abort);
    }

    #[test]
    fn test_add_member_creates_and_merges() {
        assert_eq!(
            add_member(None, "u1", &template()),
            TransactOutcome::Write(json!({ "isbn": "111", "title": "Dune", "uid": ["u1"] }))
        );

        let existing = json!({ "isbn": "111", "title": "Old", "uid": "u1" });
        assert_eq!(
            add_member(Some(&existing), "u2", &template()),
            TransactOutcome::Write(json!({ "isbn": "111", "title": "Old", "uid": ["u1", "u2"] }))
        );
    }

    #[test]
    fn test_add_existing_member_aborts() {
        let existing = json!({ "isbn": "111", "title": "Dune", "uid": ["u1"] });
        assert_eq!(
            add_member(Some(&existing), "u1", &template()),
            TransactOutcome::Abort
        );
    }

    #[test]
    fn test_remove_last_member_deletes_entry() {
        let existing = json!({ "isbn": "111", "uid": ["u1"] });
        assert_eq!(remove_member(Some(&existing), "u1"), TransactOutcome::Delete);
        assert_eq!(remove_member(None, "u1"), TransactOutcome::Abort);
    }
}
