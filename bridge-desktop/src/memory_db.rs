//! In-memory realtime database.
//!
//! Keeps the whole tree as a single `serde_json::Value` behind a
//! `tokio::sync::RwLock`. Transactions hold the write lock for the whole
//! read-modify-write, so they never conflict.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::realtime::{
    is_absent, sorted_children, ChildQuery, DbPath, RealtimeDatabase, TransactFn,
    TransactOutcome, TransactionResult,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Default)]
pub struct InMemoryRealtimeDatabase {
    root: RwLock<Value>,
}

impl InMemoryRealtimeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the database with an existing tree.
    pub fn with_data(data: Value) -> Self {
        Self {
            root: RwLock::new(prune(data).unwrap_or(Value::Null)),
        }
    }

    /// Copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }
}

fn lookup<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(node, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Drop nulls and childless containers, recursively.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| prune(child).map(|child| (key, child)))
                .collect();
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Array(items) => {
            let pruned: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!pruned.is_empty()).then_some(Value::Array(pruned))
        }
        scalar => Some(scalar),
    }
}

/// Turn `node` into an object so a child can be written below it. Arrays
/// keep their items under index keys.
fn ensure_object(node: &mut Value) {
    if node.is_object() {
        return;
    }
    let map = match node.take() {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Map::new(),
    };
    *node = Value::Object(map);
}

fn write_at(node: &mut Value, segments: &[String], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };
    if value.is_none() && lookup(node, std::slice::from_ref(head)).is_none() {
        return;
    }
    ensure_object(node);
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        write_at(child, rest, value);
    }
}

impl InMemoryRealtimeDatabase {
    fn write(root: &mut Value, path: &DbPath, value: Option<Value>) {
        let value = value.and_then(prune);
        write_at(root, path.segments(), value);
        *root = prune(root.take()).unwrap_or(Value::Null);
    }
}

#[async_trait]
impl RealtimeDatabase for InMemoryRealtimeDatabase {
    async fn get(&self, path: &DbPath) -> Result<Option<Value>> {
        let root = self.root.read().await;
        Ok(lookup(&root, path.segments())
            .filter(|value| !is_absent(value))
            .cloned())
    }

    async fn set(&self, path: &DbPath, value: Value) -> Result<()> {
        trace!(path = %path, "set");
        let mut root = self.root.write().await;
        Self::write(&mut root, path, Some(value));
        Ok(())
    }

    async fn update(&self, path: &DbPath, fields: Map<String, Value>) -> Result<()> {
        trace!(path = %path, fields = fields.len(), "update");
        let mut targets = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let mut target = path.clone();
            for segment in DbPath::parse(&key)?.segments() {
                target = target.child(segment)?;
            }
            targets.push((target, value));
        }

        let mut root = self.root.write().await;
        for (target, value) in targets {
            Self::write(&mut root, &target, Some(value));
        }
        Ok(())
    }

    async fn remove(&self, path: &DbPath) -> Result<()> {
        trace!(path = %path, "remove");
        let mut root = self.root.write().await;
        Self::write(&mut root, path, None);
        Ok(())
    }

    async fn query_children(
        &self,
        path: &DbPath,
        query: &ChildQuery,
    ) -> Result<Vec<(String, Value)>> {
        let node = self.get(path).await?;
        Ok(node
            .map(|node| query.apply(sorted_children(node)))
            .unwrap_or_default())
    }

    async fn transact(&self, path: &DbPath, update: TransactFn<'_>) -> Result<TransactionResult> {
        let mut root = self.root.write().await;
        let current = lookup(&root, path.segments())
            .filter(|value| !is_absent(value))
            .cloned();

        let committed = match update(current.as_ref()) {
            TransactOutcome::Abort => {
                return Ok(TransactionResult {
                    committed: false,
                    snapshot: current,
                })
            }
            TransactOutcome::Write(value) => {
                Self::write(&mut root, path, Some(value));
                true
            }
            TransactOutcome::Delete => {
                Self::write(&mut root, path, None);
                true
            }
        };

        let snapshot = lookup(&root, path.segments()).cloned();
        Ok(TransactionResult {
            committed,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn path(p: &str) -> DbPath {
        DbPath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get_nested() {
        let db = InMemoryRealtimeDatabase::new();
        db.set(&path("Books/111/title"), json!("Dune")).await.unwrap();

        assert_eq!(
            db.get(&path("Books/111")).await.unwrap(),
            Some(json!({ "title": "Dune" }))
        );
        assert_eq!(db.get(&path("Books/222")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_setting_null_or_empty_removes_node() {
        let db = InMemoryRealtimeDatabase::with_data(json!({
            "Books": { "1": { "title": "A" }, "2": { "title": "B" } }
        }));

        db.set(&path("Books/1"), Value::Null).await.unwrap();
        db.set(&path("Books/2/title"), json!([])).await.unwrap();

        assert_eq!(db.get(&path("Books")).await.unwrap(), None);
        assert_eq!(db.snapshot().await, Value::Null);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let db = InMemoryRealtimeDatabase::with_data(json!({
            "Users": { "u1": { "name": "Ann", "swaps": 1 } }
        }));

        let mut fields = Map::new();
        fields.insert("swaps".to_string(), json!(2));
        fields.insert("profile/city".to_string(), json!("Oslo"));
        db.update(&path("Users/u1"), fields).await.unwrap();

        assert_eq!(
            db.get(&path("Users/u1")).await.unwrap(),
            Some(json!({ "name": "Ann", "swaps": 2, "profile": { "city": "Oslo" } }))
        );
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let db = InMemoryRealtimeDatabase::with_data(json!({ "Books": { "1": { "title": "A" } } }));
        db.remove(&path("Books/9/title")).await.unwrap();
        db.remove(&path("Wishlist")).await.unwrap();

        assert_eq!(
            db.snapshot().await,
            json!({ "Books": { "1": { "title": "A" } } })
        );
    }

    #[tokio::test]
    async fn test_array_children_are_addressable() {
        let db = InMemoryRealtimeDatabase::with_data(json!({
            "Users": { "u1": { "my_books": ["111", "222"] } }
        }));

        assert_eq!(
            db.get(&path("Users/u1/my_books/1")).await.unwrap(),
            Some(json!("222"))
        );
    }

    #[tokio::test]
    async fn test_query_children_pages_by_key() {
        let db = InMemoryRealtimeDatabase::with_data(json!({
            "Books": { "c": 3, "a": 1, "d": 4, "b": 2 }
        }));

        let first = db
            .query_children(&path("Books"), &ChildQuery::by_key().limit_to_first(2))
            .await
            .unwrap();
        assert_eq!(first, vec![("a".into(), json!(1)), ("b".into(), json!(2))]);

        let second = db
            .query_children(
                &path("Books"),
                &ChildQuery::by_key().start_after("b").limit_to_first(2),
            )
            .await
            .unwrap();
        assert_eq!(second, vec![("c".into(), json!(3)), ("d".into(), json!(4))]);

        let none = db
            .query_children(&path("Wishlist"), &ChildQuery::by_key())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_transact_write_delete_abort() {
        let db = InMemoryRealtimeDatabase::new();
        let counter = path("Users/u1/swaps");

        let result = db
            .transact(&counter, &|current| {
                let n = current.and_then(Value::as_i64).unwrap_or(0);
                TransactOutcome::Write(json!(n + 1))
            })
            .await
            .unwrap();
        assert!(result.committed);
        assert_eq!(result.snapshot, Some(json!(1)));

        let result = db
            .transact(&counter, &|_| TransactOutcome::Abort)
            .await
            .unwrap();
        assert!(!result.committed);
        assert_eq!(result.snapshot, Some(json!(1)));

        let result = db
            .transact(&counter, &|_| TransactOutcome::Delete)
            .await
            .unwrap();
        assert!(result.committed);
        assert_eq!(result.snapshot, None);
        assert_eq!(db.snapshot().await, Value::Null);
    }

    #[tokio::test]
    async fn test_concurrent_transactions_do_not_lose_updates() {
        let db = Arc::new(InMemoryRealtimeDatabase::new());
        let counter = path("Users/u1/swaps");

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let db = Arc::clone(&db);
                let counter = counter.clone();
                tokio::spawn(async move {
                    db.transact(&counter, &|current| {
                        let n = current.and_then(Value::as_i64).unwrap_or(0);
                        TransactOutcome::Write(json!(n + 1))
                    })
                    .await
                    .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(db.get(&counter).await.unwrap(), Some(json!(20)));
    }
}
