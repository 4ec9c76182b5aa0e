//! Realtime Database Abstraction
//!
//! The book inventory lives in a hosted, tree-structured JSON database
//! (collections `Users`, `Books`, `Wishlist`). This module defines the
//! contract the core uses to talk to it, independent of transport:
//!
//! - `bridge_desktop::RestRealtimeDatabase` speaks the REST protocol
//! - `bridge_desktop::InMemoryRealtimeDatabase` keeps the tree in memory
//!
//! ## Tree semantics
//!
//! - Writing `null` to a path removes it.
//! - Nodes without children (empty objects or arrays) do not exist.
//! - Children are ordered by key: keys that are canonical 32-bit integers
//!   come first in numeric order, all other keys follow lexicographically.
//!
//! ## Transactions
//!
//! [`RealtimeDatabase::transact`] runs a read-modify-write against a single
//! node atomically. The update function may be invoked more than once when
//! the backend detects a concurrent write, so it must be pure.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{BridgeError, Result};

/// Characters the database refuses inside a child key.
pub const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Validate a single child key.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(BridgeError::InvalidPath("key cannot be empty".to_string()));
    }
    if let Some(c) = key
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(BridgeError::InvalidPath(format!(
            "key '{}' contains forbidden character {:?}",
            key, c
        )));
    }
    Ok(())
}

/// Slash-separated location of a node in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DbPath {
    segments: Vec<String>,
}

impl DbPath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `"Books/9780441013593/uid"`. Empty segments are
    /// ignored, so leading or trailing slashes are accepted.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_key(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Path of the child `key` below this one.
    pub fn child(&self, key: &str) -> Result<Self> {
        validate_key(key)?;
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn integer_key(key: &str) -> Option<i32> {
    key.parse::<i32>().ok().filter(|n| n.to_string() == key)
}

/// Order two child keys the way the database does.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Whether a value counts as "no data" in the tree.
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(is_absent),
        Value::Array(items) => items.iter().all(is_absent),
        _ => false,
    }
}

/// Children of a node in key order. Arrays are exposed with their indices
/// as keys; scalars have no children.
pub fn sorted_children(value: Value) -> Vec<(String, Value)> {
    let mut children: Vec<(String, Value)> = match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Vec::new(),
    };
    children.retain(|(_, child)| !is_absent(child));
    children.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    children
}

/// Key-ordered child query (`orderBy="$key"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildQuery {
    /// Only children whose key sorts strictly after this one.
    pub start_after: Option<String>,
    /// Return at most this many children from the start of the range.
    pub limit_to_first: Option<u32>,
}

impl ChildQuery {
    pub fn by_key() -> Self {
        Self::default()
    }

    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }

    pub fn limit_to_first(mut self, limit: u32) -> Self {
        self.limit_to_first = Some(limit);
        self
    }

    /// Apply the query to already key-ordered children.
    pub fn apply(&self, children: Vec<(String, Value)>) -> Vec<(String, Value)> {
        let iter = children.into_iter().filter(|(key, _)| match &self.start_after {
            Some(after) => compare_keys(key, after) == Ordering::Greater,
            None => true,
        });
        match self.limit_to_first {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}

/// What a transaction update function wants done with the node.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactOutcome {
    /// Replace the node with this value.
    Write(Value),
    /// Delete the node.
    Delete,
    /// Leave the node untouched.
    Abort,
}

/// Update function passed to [`RealtimeDatabase::transact`].
pub type TransactFn<'a> = &'a (dyn Fn(Option<&Value>) -> TransactOutcome + Send + Sync);

/// Result of a committed or aborted transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    /// Whether a write or delete was applied.
    pub committed: bool,
    /// Node value after the transaction.
    pub snapshot: Option<Value>,
}

/// Realtime database trait
///
/// All paths are absolute from the root of the tree. Implementations must be
/// safe to share between tasks.
#[async_trait]
pub trait RealtimeDatabase: Send + Sync {
    /// Read the node at `path`. `Ok(None)` when nothing is stored there.
    async fn get(&self, path: &DbPath) -> Result<Option<Value>>;

    /// Replace the node at `path`. Writing `null` removes it.
    async fn set(&self, path: &DbPath, value: Value) -> Result<()>;

    /// Merge `fields` into the node at `path`, leaving other children intact.
    async fn update(&self, path: &DbPath, fields: Map<String, Value>) -> Result<()>;

    /// Remove the node at `path`. Removing a missing node is not an error.
    async fn remove(&self, path: &DbPath) -> Result<()>;

    /// Read the children of `path` in key order, restricted by `query`.
    async fn query_children(&self, path: &DbPath, query: &ChildQuery)
        -> Result<Vec<(String, Value)>>;

    /// Atomically read-modify-write the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Conflict`] if the backend could not commit
    /// after repeated concurrent modifications.
    async fn transact(&self, path: &DbPath, update: TransactFn<'_>) -> Result<TransactionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_path() {
        let path = DbPath::parse("/Books/9780441013593/uid/").unwrap();
        assert_eq!(path.segments(), &["Books", "9780441013593", "uid"]);
        assert_eq!(path.to_string(), "Books/9780441013593/uid");
        assert_eq!(path.key(), Some("uid"));
        assert_eq!(path.parent().unwrap().to_string(), "Books/9780441013593");
        assert!(DbPath::root().is_root());
        assert!(DbPath::root().parent().is_none());
    }

    #[test]
    fn test_forbidden_keys_rejected() {
        assert!(DbPath::root().child("a.b").is_err());
        assert!(DbPath::root().child("a#b").is_err());
        assert!(DbPath::root().child("").is_err());
        assert!(DbPath::parse("Users/$uid").is_err());
        assert!(DbPath::root().child("no_isbn_42").is_ok());
    }

    #[test]
    fn test_compare_keys_puts_integers_first() {
        let mut keys = vec!["b", "10", "a", "2", "-1", "007"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["-1", "2", "10", "007", "a", "b"]);
    }

    #[test]
    fn test_isbn_keys_sort_as_strings() {
        // 13-digit keys overflow i32 and fall back to string order.
        assert_eq!(
            compare_keys("9780000000002", "9781000000001"),
            Ordering::Less
        );
    }

    #[test]
    fn test_sorted_children_skips_empty_nodes() {
        let value = json!({ "b": 1, "a": { "x": null }, "c": [] , "d": "x"});
        let keys: Vec<String> = sorted_children(value).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "d"]);
    }

    #[test]
    fn test_child_query_apply() {
        let children = sorted_children(json!({ "a": 1, "b": 2, "c": 3, "d": 4 }));

        let page = ChildQuery::by_key().limit_to_first(2).apply(children.clone());
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].0, "b");

        let page = ChildQuery::by_key()
            .start_after("b")
            .limit_to_first(5)
            .apply(children);
        let keys: Vec<&str> = page.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["c", "d"]);
    }

    #[test]
    fn test_is_absent() {
        assert!(is_absent(&Value::Null));
        assert!(is_absent(&json!({})));
        assert!(is_absent(&json!({ "a": [] })));
        assert!(!is_absent(&json!(0)));
        assert!(!is_absent(&json!("")));
    }
}
