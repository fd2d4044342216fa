//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the catalog session core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration types and the broadcast channel session events travel on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AuthEndpoints, CoreConfig, CoreConfigBuilder, PublicSurfaces, RefreshTiming};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, SessionEvent};
