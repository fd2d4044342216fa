//! Durable Key-Value Storage
//!
//! The session core mirrors its token and user record into a small string
//! key-value store so a reload can rehydrate without asking for credentials.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value storage trait
///
/// Abstracts platform-specific durable storage:
/// - Desktop: SQLite-backed table
/// - Browser hosts: localStorage
/// - Tests: in-memory map
///
/// Values are opaque strings. Callers that need structured data serialize
/// it themselves and must treat unparseable values as absent.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore, token: &str) -> Result<()> {
///     store.set("auth.access_token", token).await
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, overwriting any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
