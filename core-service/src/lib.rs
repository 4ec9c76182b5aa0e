//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (realtime database, HTTP,
//! geocoder) into the book-swap core and exposes one entry point,
//! [`CoreService`], to host applications. Desktop apps typically enable
//! the `desktop-shims` feature so a database URL is enough to get a REST
//! adapter and a reqwest HTTP client.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .database_url("https://bookswap-default-rtdb.firebaseio.com")
//!     .build()?;
//! let core = CoreService::from_config(&config)?;
//!
//! let listed = core.inventory().list_book(&uid, "0-441-01359-7").await?;
//! let mut browse = core.browse();
//! browse.load_first().await?;
//! ```

pub mod browse;
pub mod details;
pub mod error;
pub mod inventory;
pub mod owners;
pub mod wishlist;

pub use browse::BrowseSession;
pub use details::BookDetailsView;
pub use error::{CoreError, Result};
pub use inventory::{AccountDeletion, InventoryService, ListedBook};
pub use owners::{ChatChannel, MapPin, NearbyQuery, OwnerInfo, OwnerService};
pub use wishlist::{BookInterest, WishlistMatch, WishlistService};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::InMemoryRealtimeDatabase;

use std::sync::Arc;

use bridge_traits::geo::Geocoder;
use core_library::repositories::{
    BookRepository, RealtimeBookRepository, RealtimeUserRepository, RealtimeWishlistRepository,
    UserRepository, WishlistRepository,
};
use core_library::UserProfile;
use core_metadata::{BookCatalog, GoogleBooksClient};
use core_runtime::config::{CoreConfig, FeatureFlags, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver};
use tracing::{info, warn};

/// Aggregated handle to everything the services need.
pub struct CoreDependencies {
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
    pub wishlist: Arc<dyn WishlistRepository>,
    pub catalog: Arc<dyn BookCatalog>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub events: EventBus,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit handles.
    pub fn new(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        wishlist: Arc<dyn WishlistRepository>,
        catalog: Arc<dyn BookCatalog>,
    ) -> Self {
        Self {
            books,
            users,
            wishlist,
            catalog,
            geocoder: None,
            events: EventBus::default(),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Build repositories over the configured database and a Google Books
    /// catalog over the configured HTTP client, paced by the configured
    /// clock.
    pub fn from_config(config: &CoreConfig) -> Self {
        let db = Arc::clone(&config.database);
        let catalog = GoogleBooksClient::with_clock(
            Arc::clone(&config.http_client),
            config.catalog_config.clone(),
            Arc::clone(&config.clock),
        );

        Self {
            books: Arc::new(RealtimeBookRepository::new(Arc::clone(&db))),
            users: Arc::new(RealtimeUserRepository::new(Arc::clone(&db))),
            wishlist: Arc::new(RealtimeWishlistRepository::new(db)),
            catalog: Arc::new(catalog),
            geocoder: config.geocoder.clone(),
            events: EventBus::default(),
        }
    }
}

/// Tunables the services read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub page_size: u32,
    pub features: FeatureFlags,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            features: FeatureFlags::default(),
        }
    }
}

impl ServiceSettings {
    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(CoreError::InitializationFailed(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    deps: Arc<CoreDependencies>,
    settings: ServiceSettings,
}

impl CoreService {
    /// Create a service from explicit dependencies.
    ///
    /// # Errors
    /// `InitializationFailed` if the page size is out of range
    pub fn new(deps: CoreDependencies, settings: ServiceSettings) -> Result<Self> {
        settings.validate()?;
        if settings.features.enable_map_pins && deps.geocoder.is_none() {
            warn!("Map pins enabled without a geocoder; map_pins() will fail");
        }
        Ok(Self {
            deps: Arc::new(deps),
            settings,
        })
    }

    /// Validate `config` and wire the default repositories and catalog.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        let settings = ServiceSettings {
            page_size: config.page_size,
            features: config.features,
        };
        let service = Self::new(CoreDependencies::from_config(config), settings)?;
        info!(
            page_size = settings.page_size,
            remote_fallback = settings.features.enable_remote_fallback,
            map_pins = settings.features.enable_map_pins,
            "Core service initialized"
        );
        Ok(service)
    }

    /// Access the dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.deps.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.deps.events.subscribe()
    }

    /// Subscribe to events matching `predicate` only.
    ///
    /// ```ignore
    /// let mut swaps = core.event_stream(|event| matches!(event, CoreEvent::Swap(_)));
    /// while let Ok(event) = swaps.recv().await {
    ///     println!("{}", event.description());
    /// }
    /// ```
    pub fn event_stream<F>(&self, predicate: F) -> EventStream
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        EventStream::new(self.subscribe()).filter(predicate)
    }

    /// A fresh browse session; nothing is loaded until
    /// [`BrowseSession::load_first`].
    pub fn browse(&self) -> BrowseSession {
        BrowseSession::new(
            Arc::clone(&self.deps.books),
            Arc::clone(&self.deps.catalog),
            self.deps.events.clone(),
            self.settings.page_size,
            self.settings.features.enable_remote_fallback,
        )
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(
            Arc::clone(&self.deps.books),
            Arc::clone(&self.deps.users),
            Arc::clone(&self.deps.wishlist),
            Arc::clone(&self.deps.catalog),
            self.deps.events.clone(),
        )
    }

    pub fn wishlist(&self) -> WishlistService {
        WishlistService::new(
            Arc::clone(&self.deps.wishlist),
            Arc::clone(&self.deps.books),
            Arc::clone(&self.deps.users),
            Arc::clone(&self.deps.catalog),
            self.deps.events.clone(),
        )
    }

    pub fn owners(&self) -> OwnerService {
        OwnerService::new(
            Arc::clone(&self.deps.books),
            Arc::clone(&self.deps.users),
            self.deps.geocoder.clone(),
            self.settings.features.enable_map_pins,
        )
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.deps.users.find(uid).await?)
    }

    /// Store the editable profile fields. Owned books and the swap count
    /// are left alone.
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        Ok(self.deps.users.save_profile(profile).await?)
    }

    /// Details for an ISBN. Catalog failures degrade to the "not found"
    /// view.
    pub async fn book_details(&self, isbn: &str) -> BookDetailsView {
        match self.deps.catalog.lookup_isbn(isbn).await {
            Ok(Some(details)) => BookDetailsView::found(details),
            Ok(None) => BookDetailsView::not_found(isbn),
            Err(e) => {
                warn!(isbn = %isbn, error = %e, "Details lookup failed");
                BookDetailsView::not_found(isbn)
            }
        }
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("settings", &self.settings)
            .field("geocoder", &self.deps.geocoder.is_some())
            .field("events", &self.deps.events)
            .finish()
    }
}
