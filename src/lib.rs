//! Workspace placeholder crate.
//!
//! Host applications can depend on `catalog-workspace` and enable the
//! `desktop-shims` feature to get the session core wired with the desktop
//! bridges (reqwest HTTP client with a cookie store, SQLite-backed durable
//! mirror) without depending on each workspace crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, CoreService};
