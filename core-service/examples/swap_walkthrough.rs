//! # Swap Walkthrough
//!
//! Two users list books, browse the shared inventory, wish for each
//! other's books and complete a swap. Everything runs against the
//! in-memory database and a small offline catalog, so no network access
//! is needed.
//!
//! Run with: `cargo run --example swap_walkthrough --package core-service`

use anyhow::Context;
use async_trait::async_trait;
use bridge_traits::geo::{Coordinates, Geocoder};
use core_library::repositories::{
    RealtimeBookRepository, RealtimeUserRepository, RealtimeWishlistRepository,
};
use core_library::{Book, FilterMode, UserProfile};
use core_metadata::{BookCatalog, VolumeDetails};
use core_runtime::config::FeatureFlags;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{
    CoreDependencies, CoreService, InMemoryRealtimeDatabase, NearbyQuery, ServiceSettings,
};
use std::sync::Arc;

// ============================================================================
// Offline collaborators
// ============================================================================

struct ShelfCatalog {
    shelf: Vec<(Book, &'static str)>,
}

impl ShelfCatalog {
    fn new() -> Self {
        let shelf = vec![
            (
                Book::new("9780441013593")
                    .with_title("Dune")
                    .with_authors(&["Frank Herbert"])
                    .with_genre("Science Fiction")
                    .with_cover_url("https://covers.example/dune.jpg"),
                "A desert planet and the spice that rules it.",
            ),
            (
                Book::new("9780261103344")
                    .with_title("The Hobbit")
                    .with_authors(&["J.R.R. Tolkien"])
                    .with_genre("Fantasy")
                    .with_cover_url("https://covers.example/hobbit.jpg"),
                "There and back again.",
            ),
            (
                Book::new("9780552131063")
                    .with_title("Mort")
                    .with_authors(&["Terry Pratchett"])
                    .with_genre("Fantasy"),
                "",
            ),
        ];
        Self { shelf }
    }
}

#[async_trait]
impl BookCatalog for ShelfCatalog {
    async fn lookup_isbn(&self, isbn: &str) -> core_metadata::Result<Option<VolumeDetails>> {
        Ok(self
            .shelf
            .iter()
            .find(|(book, _)| book.isbn == isbn)
            .map(|(book, description)| VolumeDetails::new(book.clone(), Some(*description))))
    }

    async fn search(&self, query: &str) -> core_metadata::Result<Vec<Book>> {
        let needle = query.rsplit(':').next().unwrap_or(query).to_lowercase();
        Ok(self
            .shelf
            .iter()
            .map(|(book, _)| book)
            .filter(|book| {
                book.title.to_lowercase().contains(&needle)
                    || book.authors.to_lowercase().contains(&needle)
                    || book.genre.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

struct TownGeocoder;

#[async_trait]
impl Geocoder for TownGeocoder {
    async fn geocode(&self, address: &str) -> bridge_traits::error::Result<Option<Coordinates>> {
        Ok(match address {
            "221B Baker Street, London" => Some(Coordinates::new(51.5237, -0.1585)),
            "Rue de Rivoli, Paris" => Some(Coordinates::new(48.8566, 2.3522)),
            _ => None,
        })
    }
}

// ============================================================================
// Walkthrough
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig {
        format: LogFormat::Compact,
        ..LoggingConfig::default()
    })?;

    let db = Arc::new(InMemoryRealtimeDatabase::new());
    let deps = CoreDependencies::new(
        Arc::new(RealtimeBookRepository::new(db.clone())),
        Arc::new(RealtimeUserRepository::new(db.clone())),
        Arc::new(RealtimeWishlistRepository::new(db.clone())),
        Arc::new(ShelfCatalog::new()),
    )
    .with_geocoder(Arc::new(TownGeocoder));
    let core = CoreService::new(
        deps,
        ServiceSettings {
            page_size: 2,
            features: FeatureFlags {
                enable_remote_fallback: true,
                enable_map_pins: true,
            },
        },
    )?;

    println!("=== Profiles ===");
    for (uid, name, address) in [
        ("ada", "Ada", "221B Baker Street, London"),
        ("bo", "Bo", "Rue de Rivoli, Paris"),
    ] {
        let mut profile = UserProfile::new(uid);
        profile.name = name.to_string();
        profile.home_address = address.to_string();
        core.save_profile(&profile).await?;
        println!("saved {uid}");
    }

    println!("\n=== Listing ===");
    let inventory = core.inventory();
    for (uid, scanned) in [("ada", "0-441-01359-7"), ("bo", "978-0-261-10334-4")] {
        let listed = inventory.list_book(uid, scanned).await?;
        println!("{uid} listed '{}' ({})", listed.book.title, listed.book.isbn);
    }

    println!("\n=== Browse ===");
    let mut browse = core.browse();
    browse.load_first().await?;
    while browse.can_load_more() {
        browse.load_more().await?;
    }
    for book in browse.books() {
        println!("{} by {} [{}]", book.title, book.authors, book.genre);
    }

    browse.set_mode(FilterMode::Author).await;
    browse.set_query("pratchett").await;
    println!("local matches for 'pratchett': {}", browse.books().len());
    for book in browse.remote_results() {
        println!("not available locally: {}", book.title);
    }

    println!("\n=== Wishlist ===");
    let wishlist = core.wishlist();
    wishlist.add("ada", "9780261103344").await?;
    for found in wishlist.matches("ada").await? {
        let owners = core.owners().owners_of(&found.book.isbn).await?;
        let names: Vec<_> = owners.iter().map(|o| o.display_name.as_str()).collect();
        println!("'{}' is listed by {}", found.book.title, names.join(", "));

        let channel = core
            .owners()
            .chat_channel("ada", &found.owners[0])
            .await?;
        println!("chat channel {} ({})", channel.id, channel.name);
    }

    println!("\n=== Map ===");
    let london = Coordinates::new(51.5074, -0.1278);
    for pin in core.owners().map_pins(NearbyQuery::around(london)).await? {
        println!(
            "{} with {} at {:.1} km",
            pin.book.title,
            pin.owner.display_name,
            pin.distance_km.unwrap_or_default()
        );
    }

    println!("\n=== Swap ===");
    let swaps = inventory.complete_swap("bo", "9780261103344").await?;
    println!("bo has completed {swaps} swap(s)");

    let details = core.book_details("9780552131063").await;
    println!("Mort: {} / {}", details.description, details.cover);

    let profile = core
        .profile("bo")
        .await?
        .context("bo's profile should exist")?;
    println!("bo still owns {:?}", profile.my_books);

    Ok(())
}
