//! # Core Configuration Module
//!
//! Provides configuration management for the catalog session core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all dependencies and settings the session core needs.
//! It enforces fail-fast validation so missing bridges surface at startup
//! instead of on the first request.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Transport for the auth endpoints and every app request
//! - `KeyValueStore` - Durable mirror for the token and user record
//!
//! When the `desktop-shims` feature is enabled, a reqwest client with a
//! cookie store and a SQLite-backed key-value store are injected
//! automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .http_client(Arc::new(MyHttpClient))
//!     .key_value_store(Arc::new(MyStore))
//!     .public_surfaces(PublicSurfaces::prefixes(["/login", "/p/"]))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no base URL and no bridges
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required settings");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, KeyValueStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default lead time before expiry at which a proactive refresh fires.
pub const DEFAULT_GUARD_WINDOW: Duration = Duration::from_secs(30);

/// Default minimum delay for any scheduled refresh.
pub const DEFAULT_REFRESH_FLOOR: Duration = Duration::from_secs(5);

/// Default event bus capacity.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Paths of the three auth endpoints, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

/// Timing knobs for the background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTiming {
    /// How long before expiry the refresh should fire.
    pub guard_window: Duration,
    /// Lower bound on any scheduled delay.
    pub floor: Duration,
}

impl Default for RefreshTiming {
    fn default() -> Self {
        Self {
            guard_window: DEFAULT_GUARD_WINDOW,
            floor: DEFAULT_REFRESH_FLOOR,
        }
    }
}

impl RefreshTiming {
    pub fn validate(&self) -> Result<()> {
        if self.floor.is_zero() {
            return Err(Error::Config(
                "Refresh floor must be greater than zero".to_string(),
            ));
        }
        if self.guard_window <= self.floor {
            return Err(Error::Config(format!(
                "Refresh guard window ({:?}) must be larger than the floor ({:?})",
                self.guard_window, self.floor
            )));
        }
        Ok(())
    }
}

type SurfacePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Navigation paths that never require a session.
///
/// Logout does not remember these as post-login redirect targets.
#[derive(Clone)]
pub enum PublicSurfaces {
    /// Paths starting with any of these prefixes are public.
    Prefixes(Vec<String>),
    /// Host-supplied classifier.
    Predicate(SurfacePredicate),
}

impl PublicSurfaces {
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Prefixes(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn is_public(&self, path: &str) -> bool {
        match self {
            Self::Prefixes(prefixes) => prefixes.iter().any(|p| path.starts_with(p.as_str())),
            Self::Predicate(f) => f(path),
        }
    }
}

impl Default for PublicSurfaces {
    fn default() -> Self {
        Self::prefixes(["/login"])
    }
}

impl fmt::Debug for PublicSurfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefixes(prefixes) => f.debug_tuple("Prefixes").field(prefixes).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Core configuration for the catalog session core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL every auth endpoint is resolved against
    pub api_base_url: Url,

    /// Auth endpoint paths
    pub endpoints: AuthEndpoints,

    /// Background refresh timing
    pub refresh: RefreshTiming,

    /// Navigation surfaces that need no session
    pub public_surfaces: PublicSurfaces,

    /// API path prefixes served anonymously (no refresh-and-retry on 401)
    pub public_api_prefixes: Vec<String>,

    /// Location of the durable store when the desktop default is used
    pub storage_path: Option<PathBuf>,

    /// HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Durable key-value storage
    pub key_value_store: Arc<dyn KeyValueStore>,

    /// Capacity of the session event bus
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("endpoints", &self.endpoints)
            .field("refresh", &self.refresh)
            .field("public_surfaces", &self.public_surfaces)
            .field("public_api_prefixes", &self.public_api_prefixes)
            .field("storage_path", &self.storage_path)
            .field("http_client", &"HttpClient { ... }")
            .field("key_value_store", &"KeyValueStore { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Resolves an endpoint path against the base URL.
    pub fn endpoint_url(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.refresh.validate()?;

        for (name, path) in [
            ("login", &self.endpoints.login),
            ("refresh", &self.endpoints.refresh),
            ("logout", &self.endpoints.logout),
        ] {
            if path.trim().is_empty() {
                return Err(Error::Config(format!(
                    "The {} endpoint path cannot be empty",
                    name
                )));
            }
        }

        if self.public_api_prefixes.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(
                "Public API prefixes cannot be empty strings".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn join_url(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for the auth endpoints. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject a client that keeps the refresh cookie."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn key_value_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "KeyValueStore implementation is required for session persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteKeyValueStore. \
                 Other hosts: inject a localStorage-style store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_key_value_store(
    storage_path: Option<&PathBuf>,
) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::SqliteKeyValueStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let path = storage_path.cloned().ok_or_else(|| {
        Error::Config(
            "Storage path is required for the default key-value store. \
             Use .storage_path() or inject a KeyValueStore."
                .to_string(),
        )
    })?;

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default key-value store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteKeyValueStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default KeyValueStore: {}", e))
            })
    };

    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default KeyValueStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_key_value_store(
    _storage_path: Option<&PathBuf>,
) -> Result<Arc<dyn KeyValueStore>> {
    Err(key_value_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) once every required setting is
/// in place; it reports the first missing or invalid one.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    endpoints: Option<AuthEndpoints>,
    refresh: Option<RefreshTiming>,
    public_surfaces: Option<PublicSurfaces>,
    public_api_prefixes: Option<Vec<String>>,
    storage_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the API base URL (required).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn refresh_timing(mut self, timing: RefreshTiming) -> Self {
        self.refresh = Some(timing);
        self
    }

    pub fn public_surfaces(mut self, surfaces: PublicSurfaces) -> Self {
        self.public_surfaces = Some(surfaces);
        self
    }

    /// API path prefixes that resolve data anonymously, e.g. QR lookups.
    pub fn public_api_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_api_prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn storage_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// The client must keep cookies between requests so the refresh
    /// credential travels with refresh calls.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Config` when the base URL is missing or unparseable, or a setting
    ///   is out of range
    /// - `CapabilityMissing` when a bridge is absent and no desktop default
    ///   is available
    pub fn build(self) -> Result<CoreConfig> {
        let raw_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let api_base_url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", raw_url, e)))?;

        if api_base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base URL '{}' cannot be used as a base",
                raw_url
            )));
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let key_value_store = match self.key_value_store {
            Some(store) => store,
            None => provide_default_key_value_store(self.storage_path.as_ref())?,
        };

        let config = CoreConfig {
            api_base_url,
            endpoints: self.endpoints.unwrap_or_default(),
            refresh: self.refresh.unwrap_or_default(),
            public_surfaces: self.public_surfaces.unwrap_or_default(),
            public_api_prefixes: self
                .public_api_prefixes
                .unwrap_or_else(|| vec!["/public/".to_string()]),
            storage_path: self.storage_path,
            http_client,
            key_value_store,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
