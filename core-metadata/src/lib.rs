//! # Book Metadata Module
//!
//! Looks up book details in a remote catalog and turns catalog volumes
//! into library [`Book`](core_library::models::Book) values.
//!
//! ## Overview
//!
//! This module handles:
//! - The [`BookCatalog`] abstraction used by the service layer
//! - The Google Books provider (ISBN lookup and keyword search)
//! - Display fallbacks for missing descriptions and covers

pub mod catalog;
pub mod error;
pub mod providers;

pub use catalog::{BookCatalog, VolumeDetails};
pub use error::{MetadataError, Result};
pub use providers::GoogleBooksClient;
