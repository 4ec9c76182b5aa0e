//! # Library Management Module
//!
//! Owns the shared book inventory stored in the realtime database and
//! provides repository patterns for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models (`Book`, `Isbn`) and the stored record shapes
//! - Repositories for `Books`, `Users` and `Wishlist`
//! - Cursor pagination with a one-row lookahead
//! - Search, value selections and dedup-by-ISBN over loaded books

pub mod error;
pub mod models;
pub mod query;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{
    normalize_book_key, Book, BookRecord, Isbn, UserProfile, WishlistRecord,
};
pub use query::{BookFilter, FilterMode};
