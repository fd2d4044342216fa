//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that a host provides in its own way.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport with TLS and retry
//! - [`KeyValueStore`](storage::KeyValueStore) - Durable string key-value storage
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided. \
//!                  Desktop: enable the desktop-shims feature.".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across
//! async tasks behind `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::KeyValueStore;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
