//! Shared fixtures for the service integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::InMemoryRealtimeDatabase;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::geo::{Coordinates, Geocoder};
use core_library::repositories::{
    RealtimeBookRepository, RealtimeUserRepository, RealtimeWishlistRepository,
};
use core_library::Book;
use core_metadata::{BookCatalog, Result as MetadataResult, VolumeDetails};
use core_runtime::config::FeatureFlags;
use core_service::{CoreDependencies, CoreService, ServiceSettings};
use mockall::mock;
use serde_json::{json, Map, Value};
use std::sync::Arc;

mock! {
    pub Catalog {}

    #[async_trait]
    impl BookCatalog for Catalog {
        async fn lookup_isbn(&self, isbn: &str) -> MetadataResult<Option<VolumeDetails>>;
        async fn search(&self, query: &str) -> MetadataResult<Vec<Book>>;
    }
}

mock! {
    pub Geo {}

    #[async_trait]
    impl Geocoder for Geo {
        async fn geocode(&self, address: &str) -> BridgeResult<Option<Coordinates>>;
    }
}

pub const HOBBIT: &str = "9780261103344";
pub const DUNE: &str = "9780441013593";
pub const MORT: &str = "9780552131063";

pub fn hobbit() -> Book {
    Book::new(HOBBIT)
        .with_title("The Hobbit")
        .with_authors(&["J.R.R. Tolkien"])
        .with_genre("Fantasy")
        .with_cover_url("https://covers.example/hobbit.jpg")
}

pub fn dune() -> Book {
    Book::new(DUNE)
        .with_title("Dune")
        .with_authors(&["Frank Herbert"])
        .with_genre("Science Fiction")
        .with_cover_url("https://covers.example/dune.jpg")
}

pub fn mort() -> Book {
    Book::new(MORT)
        .with_title("Mort")
        .with_authors(&["Terry Pratchett"])
        .with_genre("Fantasy")
}

/// `Books/{isbn}` entry as the app stores it.
pub fn book_entry(book: &Book, owners: &[&str]) -> Value {
    json!({
        "isbn": book.isbn,
        "title": book.title,
        "authors": book.author_names(),
        "bookImageUrl": book.cover_url,
        "genre": book.genre,
        "uid": owners,
    })
}

/// `Books` node keyed by each entry's `isbn`.
pub fn books_node(entries: Vec<Value>) -> Value {
    let map: Map<String, Value> = entries
        .into_iter()
        .map(|entry| {
            let key = entry["isbn"].as_str().unwrap_or_default().to_string();
            (key, entry)
        })
        .collect();
    Value::Object(map)
}

/// `count` untitled-ish books keyed `isbn00`, `isbn01`, ... each owned by
/// `owner`.
pub fn numbered_books(count: usize, owner: &str) -> Value {
    let map: Map<String, Value> = (0..count)
        .map(|i| {
            let book = Book::new(format!("isbn{i:02}"))
                .with_title(&format!("Volume {i:02}"))
                .with_authors(&["Anonymous"]);
            (book.isbn.clone(), book_entry(&book, &[owner]))
        })
        .collect();
    Value::Object(map)
}

pub fn catalog_with_nothing() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_lookup_isbn().returning(|_| Ok(None));
    catalog.expect_search().never();
    catalog
}

pub struct Harness {
    pub db: Arc<InMemoryRealtimeDatabase>,
    pub core: CoreService,
}

pub fn harness(
    data: Value,
    catalog: MockCatalog,
    geocoder: Option<MockGeo>,
    features: FeatureFlags,
) -> Harness {
    let db = Arc::new(InMemoryRealtimeDatabase::with_data(data));
    let mut deps = CoreDependencies::new(
        Arc::new(RealtimeBookRepository::new(db.clone())),
        Arc::new(RealtimeUserRepository::new(db.clone())),
        Arc::new(RealtimeWishlistRepository::new(db.clone())),
        Arc::new(catalog),
    );
    if let Some(geocoder) = geocoder {
        deps = deps.with_geocoder(Arc::new(geocoder));
    }

    let settings = ServiceSettings {
        page_size: 10,
        features,
    };
    let core = CoreService::new(deps, settings).expect("valid settings");
    Harness { db, core }
}
