use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors produced by the session core.
///
/// `Clone` because a single refresh outcome is handed to every caller that
/// joined the in-flight exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from auth endpoint: {0}")]
    InvalidResponse(String),

    #[error("Session storage unavailable: {0}")]
    Storage(String),

    #[error("Stored session is corrupted: {0}")]
    CorruptedState(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session ended before the refresh completed")]
    SessionEnded,
}

impl AuthError {
    /// Whether the server refused the credentials outright (401 or 403).
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected { status: 401 | 403, .. })
    }
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Storage(message) => AuthError::Storage(message),
            other => AuthError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
