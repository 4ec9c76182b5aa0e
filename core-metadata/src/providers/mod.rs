//! External Catalog Providers
//!
//! This module contains clients for external book catalogs:
//! - Google Books - volume search and ISBN lookup
//!
//! Each provider implements [`BookCatalog`](crate::catalog::BookCatalog) and
//! maps HTTP failures onto [`MetadataError`](crate::error::MetadataError).

pub mod google_books;

pub use google_books::GoogleBooksClient;
