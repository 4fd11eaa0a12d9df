/// Errors raised by the session/permission/routing core.
///
/// Server-call failures never escape to UI code as errors: the session
/// service catches them, logs them, and converts them into state transitions
/// (logged-out, stale permissions). These variants are what that conversion
/// consumes, plus the guard-style checks exposed to protected UI regions.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("menu {0} is not granted to the current principal")]
    Unauthorized(cdss_types::MenuCode),
    #[error("malformed menu tree: {0}")]
    MalformedMenu(String),
    #[error("failed to read stored credentials: {0}")]
    CredentialRead(std::io::Error),
    #[error("failed to write stored credentials: {0}")]
    CredentialWrite(std::io::Error),
    #[error("failed to clear stored credentials: {0}")]
    CredentialClear(std::io::Error),
    #[error("failed to decode stored credentials: {0}")]
    CredentialDecode(serde_json::Error),
    #[error("failed to encode credentials for storage: {0}")]
    CredentialEncode(serde_json::Error),
    #[error("auth API call failed: {0}")]
    Api(#[from] cdss_api::ApiError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
