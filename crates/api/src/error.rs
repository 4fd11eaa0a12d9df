/// Errors surfaced by the server API and channel boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The supplied user id/password pair was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The access token was missing, expired or revoked.
    #[error("credential rejected by server")]
    Unauthenticated,
    /// The connection could not be established or was lost.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The server returned a payload the core could not decode.
    #[error("malformed server payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server reported an internal failure.
    #[error("server error: {0}")]
    Server(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
