//! Error types for credential operations

/// Errors from credential and refresh envelope handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
