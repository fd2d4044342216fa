//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with a cookie jar so the server-issued
//!   refresh cookie is carried automatically
//! - `KeyValueStore` backed by SQLite, plus an in-memory variant
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let store = SqliteKeyValueStore::new("session.db".into()).await?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod http;
mod store;

pub use http::ReqwestHttpClient;
pub use store::{MemoryKeyValueStore, SqliteKeyValueStore};
