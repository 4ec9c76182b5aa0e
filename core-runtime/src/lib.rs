//! # Core Runtime
//!
//! Runtime infrastructure shared by the book-swap crates:
//! - [`config`]: `CoreConfig` builder with fail-fast validation
//! - [`logging`]: `tracing-subscriber` setup and host log forwarding
//! - [`events`]: broadcast bus for inventory, swap, wishlist and account events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
