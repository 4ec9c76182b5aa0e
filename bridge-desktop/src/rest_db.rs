//! Realtime database REST adapter.
//!
//! Every node is addressable as `{base_url}/{path}.json`. Reads are `GET`,
//! replacements `PUT`, merges `PATCH`, removals `DELETE`. Key-ordered child
//! queries use `orderBy="$key"` with `startAfter` and `limitToFirst`.
//!
//! Transactions use conditional requests: the node is read with
//! `X-Firebase-ETag: true`, then written with `if-match: {etag}`. A `412`
//! response carries the current value and ETag, and the update function is
//! re-run against them.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::realtime::{
    is_absent, sorted_children, ChildQuery, DbPath, RealtimeDatabase, TransactFn,
    TransactOutcome, TransactionResult,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const IF_MATCH_HEADER: &str = "if-match";
const ETAG_HEADER: &str = "ETag";
const STATUS_PRECONDITION_FAILED: u16 = 412;

/// Default number of compare-and-set attempts before a transaction gives up.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 25;

pub struct RestRealtimeDatabase {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth_token: Option<String>,
    max_transaction_attempts: u32,
}

impl RestRealtimeDatabase {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }

    /// Token sent as the `auth` query parameter (ID token or database secret).
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &DbPath, params: &[(&str, String)]) -> String {
        let encoded: Vec<String> = path
            .segments()
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = format!("{}/{}.json", self.base_url, encoded.join("/"));

        let mut query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        if let Some(token) = &self.auth_token {
            query.push(format!("auth={}", urlencoding::encode(token)));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    async fn send(&self, request: HttpRequest, path: &DbPath) -> Result<HttpResponse> {
        debug!(method = ?request.method, path = %path, "Realtime database request");
        self.http.execute(request).await
    }

    fn check(response: HttpResponse, path: &DbPath) -> Result<HttpResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = match response.status {
            401 | 403 => format!("permission denied at '{}'", path),
            status => format!("HTTP {} at '{}': {}", status, path, body),
        };
        Err(BridgeError::DatabaseError(message))
    }

    fn parse_node(response: &HttpResponse) -> Result<Option<Value>> {
        if response.body.is_empty() {
            return Ok(None);
        }
        let value: Value = response.json()?;
        Ok((!is_absent(&value)).then_some(value))
    }

    fn etag(response: &HttpResponse, path: &DbPath) -> Result<String> {
        response
            .header(ETAG_HEADER)
            .map(str::to_string)
            .ok_or_else(|| {
                BridgeError::DatabaseError(format!("missing ETag for '{}'", path))
            })
    }

    async fn write(&self, path: &DbPath, value: &Value) -> Result<()> {
        let request = HttpRequest::new(
            HttpMethod::Put,
            self.url(path, &[("print", "silent".into())]),
        )
        .json(value)?;
        Self::check(self.send(request, path).await?, path)?;
        Ok(())
    }

    async fn read_with_etag(&self, path: &DbPath) -> Result<(Option<Value>, String)> {
        let request =
            HttpRequest::get(self.url(path, &[])).header(ETAG_REQUEST_HEADER, "true");
        let response = Self::check(self.send(request, path).await?, path)?;
        Ok((Self::parse_node(&response)?, Self::etag(&response, path)?))
    }
}

#[async_trait]
impl RealtimeDatabase for RestRealtimeDatabase {
    async fn get(&self, path: &DbPath) -> Result<Option<Value>> {
        let response = self
            .send(HttpRequest::get(self.url(path, &[])), path)
            .await?;
        Self::parse_node(&Self::check(response, path)?)
    }

    async fn set(&self, path: &DbPath, value: Value) -> Result<()> {
        if is_absent(&value) {
            return self.remove(path).await;
        }
        self.write(path, &value).await
    }

    async fn update(&self, path: &DbPath, fields: Map<String, Value>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let request = HttpRequest::new(
            HttpMethod::Patch,
            self.url(path, &[("print", "silent".into())]),
        )
        .json(&fields)?;
        Self::check(self.send(request, path).await?, path)?;
        Ok(())
    }

    async fn remove(&self, path: &DbPath) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Delete, self.url(path, &[]));
        Self::check(self.send(request, path).await?, path)?;
        Ok(())
    }

    async fn query_children(
        &self,
        path: &DbPath,
        query: &ChildQuery,
    ) -> Result<Vec<(String, Value)>> {
        let mut params = vec![("orderBy", "\"$key\"".to_string())];
        if let Some(after) = &query.start_after {
            params.push(("startAfter", Value::String(after.clone()).to_string()));
        }
        if let Some(limit) = query.limit_to_first {
            params.push(("limitToFirst", limit.to_string()));
        }

        let response = self
            .send(HttpRequest::get(self.url(path, &params)), path)
            .await?;
        let node = Self::parse_node(&Self::check(response, path)?)?;

        // The server filters but returns an unordered object.
        Ok(node
            .map(|node| query.apply(sorted_children(node)))
            .unwrap_or_default())
    }

    async fn transact(&self, path: &DbPath, update: TransactFn<'_>) -> Result<TransactionResult> {
        let (mut current, mut etag) = self.read_with_etag(path).await?;

        for attempt in 1..=self.max_transaction_attempts {
            let request = match update(current.as_ref()) {
                TransactOutcome::Abort => {
                    return Ok(TransactionResult {
                        committed: false,
                        snapshot: current,
                    })
                }
                TransactOutcome::Write(value) if !is_absent(&value) => {
                    HttpRequest::new(HttpMethod::Put, self.url(path, &[])).json(&value)?
                }
                TransactOutcome::Write(_) | TransactOutcome::Delete => {
                    HttpRequest::new(HttpMethod::Delete, self.url(path, &[]))
                }
            }
            .header(IF_MATCH_HEADER, etag.clone());

            let response = self.send(request, path).await?;
            if response.status == STATUS_PRECONDITION_FAILED {
                warn!(path = %path, attempt, "Transaction conflict, retrying");
                etag = Self::etag(&response, path)?;
                current = Self::parse_node(&response)?;
                continue;
            }

            let response = Self::check(response, path)?;
            return Ok(TransactionResult {
                committed: true,
                snapshot: Self::parse_node(&response)?,
            });
        }

        Err(BridgeError::Conflict(format!(
            "transaction at '{}' did not commit after {} attempts",
            path, self.max_transaction_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::Sequence;
    use serde_json::json;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    const BASE: &str = "https://bookswap.example.com";

    fn path(p: &str) -> DbPath {
        DbPath::parse(p).unwrap()
    }

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status, body.to_string())
    }

    fn response_with_etag(status: u16, body: Value, etag: &str) -> HttpResponse {
        let mut response = response(status, body);
        response
            .headers
            .insert("etag".to_string(), etag.to_string());
        response
    }

    fn body_of(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_get_builds_url_with_auth() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url == "https://bookswap.example.com/Users/u1.json?auth=t%2Fk"
            })
            .times(1)
            .returning(|_| Ok(response(200, json!({ "name": "Ann" }))));

        let db = RestRealtimeDatabase::new(Arc::new(http), format!("{}/", BASE))
            .with_auth_token("t/k");
        let value = db.get(&path("Users/u1")).await.unwrap();

        assert_eq!(value, Some(json!({ "name": "Ann" })));
    }

    #[tokio::test]
    async fn test_get_missing_node_is_none() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "null")));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        assert_eq!(db.get(&path("Books/1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_permission_denied_maps_to_database_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(401, json!({ "error": "Permission denied" }))));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        let err = db.get(&path("Users")).await.unwrap_err();

        assert!(matches!(err, BridgeError::DatabaseError(msg) if msg.contains("permission denied")));
    }

    #[tokio::test]
    async fn test_set_null_issues_delete() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Delete && req.url.ends_with("/Books/1.json"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "null")));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        db.set(&path("Books/1"), Value::Null).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_sends_patch() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Patch
                    && req.url.ends_with("/Users/u1.json?print=silent")
                    && body_of(req) == json!({ "swaps": 3 })
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(204, "")));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        let mut fields = Map::new();
        fields.insert("swaps".to_string(), json!(3));
        db.update(&path("Users/u1"), fields).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_children_encodes_key_ordering() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                req.url
                    == "https://bookswap.example.com/Books.json?orderBy=%22%24key%22&startAfter=%22111%22&limitToFirst=3"
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    json!({ "333": { "title": "C" }, "222": { "title": "B" } }),
                ))
            });

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        let children = db
            .query_children(
                &path("Books"),
                &ChildQuery::by_key().start_after("111").limit_to_first(3),
            )
            .await
            .unwrap();

        let keys: Vec<&str> = children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["222", "333"]);
    }

    #[tokio::test]
    async fn test_transact_retries_after_precondition_failed() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();

        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.headers.get(ETAG_REQUEST_HEADER) == Some(&"true".to_string())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response_with_etag(200, json!(["a"]), "e1")));
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.headers.get(IF_MATCH_HEADER) == Some(&"e1".to_string())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response_with_etag(412, json!(["a", "b"]), "e2")));
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.headers.get(IF_MATCH_HEADER) == Some(&"e2".to_string())
                    && body_of(req) == json!(["a", "b", "c"])
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(response(200, body_of(&req))));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        let result = db
            .transact(&path("Books/1/uid"), &|current| {
                let mut owners = current
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                owners.push(json!("c"));
                TransactOutcome::Write(Value::Array(owners))
            })
            .await
            .unwrap();

        assert!(result.committed);
        assert_eq!(result.snapshot, Some(json!(["a", "b", "c"])));
    }

    #[tokio::test]
    async fn test_transact_gives_up_after_max_attempts() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Get)
            .times(1)
            .returning(|_| Ok(response_with_etag(200, json!(1), "e0")));
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Put)
            .times(2)
            .returning(|_| Ok(response_with_etag(412, json!(1), "e1")));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE).with_max_transaction_attempts(2);
        let err = db
            .transact(&path("Users/u1/swaps"), &|_| TransactOutcome::Write(json!(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_transact_abort_does_not_write() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response_with_etag(200, json!("x"), "e0")));

        let db = RestRealtimeDatabase::new(Arc::new(http), BASE);
        let result = db
            .transact(&path("Books/1/title"), &|_| TransactOutcome::Abort)
            .await
            .unwrap();

        assert!(!result.committed);
        assert_eq!(result.snapshot, Some(json!("x")));
    }
}
