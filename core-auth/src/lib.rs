//! # Session Core
//!
//! Client-side session lifecycle for the catalog dashboard.
//!
//! ## Overview
//!
//! A short-lived bearer token lives in memory and is mirrored, together with
//! the signed-in user, into durable key-value storage. A longer-lived refresh
//! credential stays on the server side (an httpOnly cookie) and is used to
//! mint new bearer tokens:
//!
//! - proactively, by a single timer armed shortly before expiry
//! - reactively, when an API call comes back `401`
//! - at boot, to validate a session found in storage
//!
//! ## Components
//!
//! - [`token_clock`]: expiry extraction and refresh scheduling
//! - [`SessionStore`]: in-memory token, durable mirror, refresh timer, logout handlers
//! - [`RefreshCoordinator`]: single-flight token exchange
//! - [`AuthSession`]: the `Hydrating`/`Authenticated`/`Unauthenticated` state machine
//! - [`AuthorizedClient`]: bearer attachment and 401 refresh-and-replay
//! - [`HttpAuthApi`]: the login/refresh/logout endpoints over JSON HTTP

pub mod api;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod session;
pub mod session_store;
pub mod token_clock;
pub mod types;

pub use api::{AuthApi, HttpAuthApi};
pub use error::{AuthError, Result};
pub use interceptor::{AuthorizedClient, Exemptions};
pub use refresh::RefreshCoordinator;
pub use session::AuthSession;
pub use session_store::{LogoutHandlerId, SessionStore, StoredSession, ACCESS_TOKEN_KEY, USER_KEY};
pub use token_clock::RefreshSchedule;
pub use types::{AccessToken, LoginGrant, Role, SessionStatus, User};
