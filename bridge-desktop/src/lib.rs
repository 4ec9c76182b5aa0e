//! # Desktop Bridge Implementations
//!
//! Default adapters for desktop hosts (macOS, Windows, Linux) and for tests:
//!
//! - [`ReqwestHttpClient`]: `HttpClient` backed by `reqwest` with retry/backoff
//! - [`RestRealtimeDatabase`]: `RealtimeDatabase` speaking the hosted database
//!   REST protocol over any `HttpClient`
//! - [`InMemoryRealtimeDatabase`]: `RealtimeDatabase` held in process memory,
//!   used for local development and as the test fixture across the workspace
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, RestRealtimeDatabase};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let database = RestRealtimeDatabase::new(http, "https://bookswap-default-rtdb.firebaseio.com")
//!     .with_auth_token(token);
//! ```

mod http;
mod memory_db;
mod rest_db;

pub use http::ReqwestHttpClient;
pub use memory_db::InMemoryRealtimeDatabase;
pub use rest_db::RestRealtimeDatabase;
