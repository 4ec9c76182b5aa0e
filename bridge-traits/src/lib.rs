//! # Host Bridge Traits
//!
//! Capabilities the book-swap core needs from its host, expressed as traits
//! so each platform can plug in its own implementation.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`HttpClient`](http::HttpClient) | Async HTTP for the catalog API and the database REST adapter |
//! | [`RealtimeDatabase`](realtime::RealtimeDatabase) | Tree-structured remote store holding users, books and wishlists |
//! | [`Geocoder`](geo::Geocoder) | Address to coordinates, used for owner map pins |
//! | [`Clock`](time::Clock) | Time source for event timestamps |
//! | [`LoggerSink`](time::LoggerSink) | Forward structured logs to the host |
//!
//! Desktop adapters live in `bridge-desktop`. Mobile hosts inject their own.
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start when a required capability is missing:
//!
//! ```ignore
//! let database = config.database.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "RealtimeDatabase".to_string(),
//!     message: "Set a database URL or inject a RealtimeDatabase adapter.".to_string(),
//! })?;
//! ```
//!
//! All traits require `Send + Sync` and report failures as
//! [`BridgeError`](error::BridgeError).

pub mod error;
pub mod geo;
pub mod http;
pub mod realtime;
pub mod time;

pub use error::BridgeError;

pub use geo::{Coordinates, Geocoder};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use realtime::{
    ChildQuery, DbPath, RealtimeDatabase, TransactFn, TransactOutcome, TransactionResult,
};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
