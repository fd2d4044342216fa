use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
