//! Workspace placeholder crate.
//!
//! This crate exposes the workspace feature flags so host applications can
//! depend on `bookswap-workspace` and pick up `core-service` with the desktop
//! adapters without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
