//! Google Books API Client
//!
//! ## API Endpoints
//!
//! - **Volumes**: `{base}/volumes?q={query}&maxResults={n}[&key={api_key}]`
//!
//! ISBN lookups use the `isbn:{isbn}` query. Keyword searches accept the
//! catalog's field prefixes (`inauthor:`, `subject:`) unchanged.
//!
//! ## Parsing
//!
//! Each item's `volumeInfo` becomes a [`Book`]:
//! - title defaults to "Unknown Title"
//! - authors are joined with ", ", default "Unknown Author"
//! - categories are joined with ", ", default "Unknown Genre"
//! - `imageLinks.thumbnail` is upgraded from `http://` to `https://`
//! - the ISBN prefers `ISBN_13`, then `ISBN_10`, then a title-derived id
//!
//! ## Rate Limiting
//!
//! An optional minimum interval between requests can be configured. A 429
//! response is reported as [`MetadataError::RateLimited`] with the server's
//! `Retry-After` hint.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::providers::GoogleBooksClient;
//! use core_runtime::config::CatalogApiConfig;
//!
//! let client = GoogleBooksClient::new(http_client, CatalogApiConfig::new().with_api_key(key));
//! let details = client.lookup_isbn("9780441013593").await?;
//! ```

use crate::catalog::{BookCatalog, VolumeDetails};
use crate::error::{MetadataError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::{fallback_isbn_for_title, Book, Isbn};
use core_runtime::config::CatalogApiConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const PROVIDER: &str = "Google Books";

/// Timeout for API requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Used when the server sends 429 without a usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: Arc<dyn HttpClient>,
    config: CatalogApiConfig,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Enforces a minimum delay between requests
struct RateLimiter {
    clock: Arc<dyn Clock>,
    last_request_ms: Option<i64>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_request_ms: None,
            min_interval,
        }
    }

    async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request_ms {
            let elapsed_ms = self.clock.unix_timestamp_millis() - last;
            let required_ms = self.min_interval.as_millis() as i64;
            if elapsed_ms < required_ms {
                let wait = Duration::from_millis((required_ms - elapsed_ms) as u64);
                debug!("Rate limiting: waiting {:?}", wait);
                sleep(wait).await;
            }
        }
        self.last_request_ms = Some(self.clock.unix_timestamp_millis());
    }
}

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<VolumeItem>,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeItem {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    image_links: Option<ImageLinks>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    small_thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl VolumeInfo {
    fn identifier(&self, kind: &str) -> Option<&str> {
        self.industry_identifiers
            .iter()
            .find(|id| id.kind == kind)
            .map(|id| id.identifier.trim())
            .filter(|id| !id.is_empty())
    }

    /// Catalog ISBN, normalized to 13 digits when it validates.
    fn isbn(&self) -> String {
        let raw = self
            .identifier("ISBN_13")
            .or_else(|| self.identifier("ISBN_10"));
        match raw {
            Some(raw) => Isbn::parse(raw)
                .map(Isbn::into_inner)
                .unwrap_or_else(|_| raw.to_string()),
            None => fallback_isbn_for_title(self.title.as_deref().unwrap_or_default()),
        }
    }

    fn cover_url(&self) -> String {
        self.image_links
            .as_ref()
            .and_then(|links| links.thumbnail.as_deref().or(links.small_thumbnail.as_deref()))
            .map(secure_url)
            .unwrap_or_default()
    }

    fn into_details(self, isbn: String) -> VolumeDetails {
        let book = Book::new(isbn)
            .with_title(self.title.as_deref().unwrap_or_default())
            .with_authors(&self.authors)
            .with_cover_url(&self.cover_url())
            .with_genre(&self.categories.join(", "));
        VolumeDetails::new(book, self.description.as_deref())
    }
}

fn secure_url(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

impl GoogleBooksClient {
    /// Creates a new Google Books client
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client for making requests
    /// * `config` - API key, base URL, result limit and request spacing
    pub fn new(http_client: Arc<dyn HttpClient>, config: CatalogApiConfig) -> Self {
        Self::with_clock(http_client, config, Arc::new(SystemClock))
    }

    /// Like [`GoogleBooksClient::new`], pacing requests by `clock`.
    pub fn with_clock(
        http_client: Arc<dyn HttpClient>,
        config: CatalogApiConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let min_interval = config.min_request_interval;
        Self {
            http_client,
            config,
            retry_policy: RetryPolicy::default(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(min_interval, clock))),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Wait at least `min_interval` between consecutive requests.
    pub fn with_min_interval(mut self, min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        self.rate_limiter = Arc::new(Mutex::new(RateLimiter::new(min_interval, clock)));
        self
    }

    fn volumes_url(&self, query: &str, max_results: u32) -> String {
        let mut url = format!(
            "{}/volumes?q={}&maxResults={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            max_results
        );
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }

    /// `Ok(None)` on 404.
    async fn fetch_volumes(&self, query: &str, max_results: u32) -> Result<Option<VolumesResponse>> {
        debug!(query = %query, max_results, "Querying {}", PROVIDER);
        self.rate_limiter.lock().await.wait_if_needed().await;

        let request = HttpRequest::get(self.volumes_url(query, max_results))
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(|e| MetadataError::NetworkError(format!("{PROVIDER} request failed: {e}")))?;

        match response.status {
            200..=299 => {}
            404 => return Ok(None),
            429 => return Err(rate_limited(&response)),
            status => {
                return Err(MetadataError::HttpError {
                    status,
                    body: String::from_utf8_lossy(&response.body).to_string(),
                })
            }
        }

        if response.body.is_empty() {
            return Ok(Some(VolumesResponse::default()));
        }
        serde_json::from_slice(&response.body)
            .map(Some)
            .map_err(|e| MetadataError::JsonParse(format!("Failed to parse volumes: {e}")))
    }
}

fn rate_limited(response: &HttpResponse) -> MetadataError {
    let retry_after = response
        .header("Retry-After")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    warn!(retry_after, "{} rate limit hit", PROVIDER);
    MetadataError::RateLimited {
        provider: PROVIDER.to_string(),
        retry_after_seconds: retry_after,
    }
}

#[async_trait]
impl BookCatalog for GoogleBooksClient {
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<VolumeDetails>> {
        let isbn = match Isbn::parse(isbn) {
            Ok(isbn) => isbn,
            Err(e) => {
                debug!(isbn = %isbn, error = %e, "Not a catalog ISBN, skipping lookup");
                return Ok(None);
            }
        };

        let Some(response) = self
            .fetch_volumes(&format!("isbn:{isbn}"), 1)
            .await?
        else {
            return Ok(None);
        };

        let details = response
            .items
            .into_iter()
            .next()
            .map(|item| item.volume_info.into_details(isbn.to_string()));
        match &details {
            Some(d) => info!(isbn = %isbn, title = %d.book.title, "Catalog lookup hit"),
            None => info!(isbn = %isbn, "Catalog has no volume for ISBN"),
        }
        Ok(details)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .fetch_volumes(query, self.config.max_results)
            .await?
            .unwrap_or_default();

        let books: Vec<Book> = response
            .items
            .into_iter()
            .map(|item| {
                let isbn = item.volume_info.isbn();
                item.volume_info.into_details(isbn).book
            })
            .collect();
        debug!(query = %query, results = books.len(), "Catalog search finished");
        Ok(books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_library::models::{UNKNOWN_AUTHOR, UNKNOWN_GENRE, UNKNOWN_TITLE};
    use mockall::mock;
    use serde_json::{json, Value};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn client(http: MockHttpClient) -> GoogleBooksClient {
        GoogleBooksClient::new(
            Arc::new(http),
            CatalogApiConfig::new()
                .with_api_key("k&y")
                .with_base_url("https://books.example/v1/")
                .with_max_results(5)
                .with_min_request_interval(Duration::ZERO),
        )
        .with_retry_policy(RetryPolicy::no_retry())
    }

    fn ok(body: Value) -> HttpResponse {
        HttpResponse::new(200, body.to_string())
    }

    fn dune_item() -> Value {
        json!({
            "volumeInfo": {
                "title": "Dune",
                "authors": ["Frank Herbert"],
                "categories": ["Fiction", "Science Fiction"],
                "imageLinks": { "thumbnail": "http://books.google.com/dune.jpg" },
                "description": "A desert planet.",
                "industryIdentifiers": [
                    { "type": "ISBN_10", "identifier": "0441013597" },
                    { "type": "ISBN_13", "identifier": "9780441013593" }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_lookup_builds_url_and_parses() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.url
                    == "https://books.example/v1/volumes?q=isbn%3A9780441013593&maxResults=1&key=k%26y"
            })
            .times(1)
            .returning(|_| Ok(ok(json!({ "items": [dune_item()] }))));

        let details = client(http)
            .lookup_isbn("0-441-01359-7")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(details.book.isbn, "9780441013593");
        assert_eq!(details.book.title, "Dune");
        assert_eq!(details.book.genre, "Fiction, Science Fiction");
        assert_eq!(details.book.cover_url, "https://books.google.com/dune.jpg");
        assert_eq!(details.description, "A desert planet.");
    }

    #[tokio::test]
    async fn test_lookup_without_items_is_none() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(ok(json!({ "totalItems": 0 }))));

        assert_eq!(client(http).lookup_isbn("9780441013593").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_404_is_none() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(404, "")));

        assert_eq!(client(http).lookup_isbn("9780441013593").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_skips_non_isbn_ids() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        assert_eq!(client(http).lookup_isbn("no_isbn_96354").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_fields_use_defaults() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(ok(json!({ "items": [{ "volumeInfo": {} }, {}] }))));

        let books = client(http).search("anything").await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, UNKNOWN_TITLE);
        assert_eq!(books[0].authors, UNKNOWN_AUTHOR);
        assert_eq!(books[0].genre, UNKNOWN_GENRE);
        assert_eq!(books[0].cover_url, "");
        assert_eq!(books[0].isbn, fallback_isbn_for_title(""));
    }

    #[tokio::test]
    async fn test_search_passes_prefixed_query() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url.contains("q=inauthor%3Aherbert&maxResults=5"))
            .times(1)
            .returning(|_| Ok(ok(json!({ "items": [dune_item()] }))));

        let books = client(http).search("inauthor:herbert").await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].isbn, "9780441013593");
    }

    #[tokio::test]
    async fn test_search_prefers_isbn13_then_isbn10() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(ok(json!({ "items": [
                { "volumeInfo": {
                    "title": "Only Ten",
                    "industryIdentifiers": [{ "type": "ISBN_10", "identifier": "0441013597" }]
                } },
                { "volumeInfo": {
                    "title": "Other Id",
                    "industryIdentifiers": [{ "type": "OTHER", "identifier": "UOM:39015" }]
                } }
            ] })))
        });

        let books = client(http).search("dune").await.unwrap();
        assert_eq!(books[0].isbn, "9780441013593");
        assert_eq!(books[1].isbn, fallback_isbn_for_title("Other Id"));
    }

    #[tokio::test]
    async fn test_blank_search_makes_no_request() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);
        assert!(client(http).search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            let mut response = HttpResponse::new(429, "");
            response
                .headers
                .insert("Retry-After".to_string(), "7".to_string());
            Ok(response)
        });

        let result = client(http).search("dune").await;
        assert!(matches!(
            result,
            Err(MetadataError::RateLimited {
                retry_after_seconds: 7,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_http_and_network_errors() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(500, "boom")));
        assert!(matches!(
            client(http).search("dune").await,
            Err(MetadataError::HttpError { status: 500, .. })
        ));

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("offline".to_string())));
        assert!(matches!(
            client(http).search("dune").await,
            Err(MetadataError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "<html>")));
        assert!(matches!(
            client(http).search("dune").await,
            Err(MetadataError::JsonParse(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_between_requests() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(2)
            .returning(|_| Ok(ok(json!({}))));

        let client = client(http)
            .with_min_interval(Duration::from_millis(500), Arc::new(SystemClock));
        let started = tokio::time::Instant::now();
        client.search("a").await.unwrap();
        client.search("b").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_secure_url() {
        assert_eq!(secure_url("http://x/y.jpg"), "https://x/y.jpg");
        assert_eq!(secure_url("https://x/y.jpg"), "https://x/y.jpg");
    }
}
