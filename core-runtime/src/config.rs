//! # Core Configuration Module
//!
//! Builder-based configuration for the book-swap core.
//!
//! ## Required Dependencies
//!
//! - `RealtimeDatabase` - either injected directly, or built from a database
//!   URL when the `desktop-shims` feature provides the REST adapter
//! - `HttpClient` - catalog lookups (desktop default: reqwest)
//!
//! ## Optional Dependencies
//!
//! - `Geocoder` - owner map pins (required when `enable_map_pins` is set)
//! - `Clock` - catalog request pacing (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CatalogApiConfig, CoreConfig};
//!
//! let config = CoreConfig::builder()
//!     .database_url("https://bookswap-default-rtdb.firebaseio.com")
//!     .database_auth_token(id_token)
//!     .catalog_config(CatalogApiConfig::new().with_api_key(api_key))
//!     .build()?;
//! ```
//!
//! Building without a database fails fast with an actionable message:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - no database configured");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, Geocoder, HttpClient, RealtimeDatabase, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default number of records per browse page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest accepted browse page.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Public Google Books API endpoint.
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.googleapis.com/books/v1";
/// Upper bound the catalog API accepts for `maxResults`.
pub const MAX_CATALOG_RESULTS: u32 = 40;
/// Default spacing between consecutive catalog requests.
pub const DEFAULT_CATALOG_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Core configuration.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Realtime database holding `Users`, `Books` and `Wishlist`
    pub database: Arc<dyn RealtimeDatabase>,

    /// Base URL of the database, when it was configured by URL
    pub database_url: Option<String>,

    /// Token appended to database requests. Never logged.
    pub database_auth_token: Option<String>,

    /// HTTP client for catalog requests
    pub http_client: Arc<dyn HttpClient>,

    /// Address geocoder for map pins (optional)
    pub geocoder: Option<Arc<dyn Geocoder>>,

    /// Time source the catalog client paces its requests by
    pub clock: Arc<dyn Clock>,

    /// Book catalog API settings
    pub catalog_config: CatalogApiConfig,

    /// Records per browse page
    pub page_size: u32,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database", &"RealtimeDatabase { ... }")
            .field("database_url", &self.database_url)
            .field(
                "database_auth_token",
                &self.database_auth_token.as_ref().map(|_| "***"),
            )
            .field("http_client", &"HttpClient { ... }")
            .field("geocoder", &self.geocoder.as_ref().map(|_| "Geocoder { ... }"))
            .field("catalog_config", &self.catalog_config)
            .field("page_size", &self.page_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Query the catalog when a search finds nothing in the shared inventory
    pub enable_remote_fallback: bool,

    /// Geocode owner addresses into map pins (requires a Geocoder)
    pub enable_map_pins: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_remote_fallback: true,
            enable_map_pins: false,
        }
    }
}

/// Book catalog API settings.
///
/// The API key is optional; anonymous requests are accepted with a lower
/// quota. Keys should come from the host's secure configuration, never from
/// the binary.
///
/// ```no_run
/// use core_runtime::config::CatalogApiConfig;
///
/// let config = CatalogApiConfig::new()
///     .with_api_key("AIza...")
///     .with_max_results(20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// `maxResults` for keyword searches (1..=40)
    pub max_results: u32,
    /// Minimum spacing between catalog requests, measured on the
    /// configured clock
    pub min_request_interval: Duration,
}

impl Default for CatalogApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogApiConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            max_results: 20,
            min_request_interval: DEFAULT_CATALOG_MIN_INTERVAL,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(Error::Config(
                    "Catalog API key cannot be blank. Omit it to use anonymous access."
                        .to_string(),
                ));
            }
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Catalog base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }

        if self.max_results == 0 || self.max_results > MAX_CATALOG_RESULTS {
            return Err(Error::Config(format!(
                "Catalog max_results must be between 1 and {}",
                MAX_CATALOG_RESULTS
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks the page size range, the catalog settings, and that enabled
    /// features have the bridges they need.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        self.catalog_config.validate()?;

        if self.features.enable_map_pins && self.geocoder.is_none() {
            return Err(Error::Config(
                "Map pins enabled but no Geocoder provided. \
                 Disable the feature or inject a Geocoder implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_database_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::Config("Database URL cannot be empty".to_string()));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(Error::Config(format!(
            "Database URL must start with https:// (got '{}')",
            url
        )));
    }
    Ok(())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for catalog lookups. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack (URLSession/OkHttp)."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_rest_database(
    http_client: Arc<dyn HttpClient>,
    url: &str,
    auth_token: Option<&str>,
) -> Result<Arc<dyn RealtimeDatabase>> {
    use bridge_desktop::RestRealtimeDatabase;

    let mut database = RestRealtimeDatabase::new(http_client, url);
    if let Some(token) = auth_token {
        database = database.with_auth_token(token);
    }
    let database: Arc<dyn RealtimeDatabase> = Arc::new(database);
    Ok(database)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_rest_database(
    _http_client: Arc<dyn HttpClient>,
    _url: &str,
    _auth_token: Option<&str>,
) -> Result<Arc<dyn RealtimeDatabase>> {
    Err(Error::CapabilityMissing {
        capability: "RealtimeDatabase".to_string(),
        message: "A database URL was given but the REST adapter is not available. \
                 Desktop: enable the 'desktop-shims' feature. \
                 Mobile: inject the platform SDK database via .database()."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database: Option<Arc<dyn RealtimeDatabase>>,
    database_url: Option<String>,
    database_auth_token: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    clock: Option<Arc<dyn Clock>>,
    catalog_config: Option<CatalogApiConfig>,
    page_size: Option<u32>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Injects a database implementation. Takes precedence over
    /// [`database_url`](Self::database_url).
    pub fn database(mut self, database: Arc<dyn RealtimeDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// Sets the database base URL, e.g.
    /// `https://bookswap-default-rtdb.firebaseio.com`.
    ///
    /// With the `desktop-shims` feature a REST adapter is created from it.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Sets the token sent with every database request.
    pub fn database_auth_token(mut self, token: impl Into<String>) -> Self {
        self.database_auth_token = Some(token.into());
        self
    }

    /// Sets the HTTP client.
    ///
    /// If not provided, the reqwest-based default is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog_config(mut self, config: CatalogApiConfig) -> Self {
        self.catalog_config = Some(config);
        self
    }

    /// Records per browse page. Default: 10
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Default: true
    pub fn enable_remote_fallback(mut self, enabled: bool) -> Self {
        self.features.enable_remote_fallback = enabled;
        self
    }

    /// Requires a `Geocoder`. Default: false
    pub fn enable_map_pins(mut self, enabled: bool) -> Self {
        self.features.enable_map_pins = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - no database injected and no database URL set
    /// - the database URL is malformed
    /// - a required bridge is missing and has no platform default
    /// - values are out of range or features lack their bridges
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        if let Some(url) = &self.database_url {
            validate_database_url(url)?;
        }

        let database = match (self.database, &self.database_url) {
            (Some(database), _) => database,
            (None, Some(url)) => provide_rest_database(
                Arc::clone(&http_client),
                url,
                self.database_auth_token.as_deref(),
            )?,
            (None, None) => {
                return Err(Error::Config(
                    "A database is required. Use .database_url() or inject one with .database()."
                        .to_string(),
                ))
            }
        };

        let config = CoreConfig {
            database,
            database_url: self.database_url,
            database_auth_token: self.database_auth_token,
            http_client,
            geocoder: self.geocoder,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            catalog_config: self.catalog_config.unwrap_or_default(),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
