//! Credential persistence boundary.
//!
//! The core reads the persisted token pair once at startup, writes it on
//! login and clears it on logout. The store is deliberately a small trait so
//! the surrounding application decides where credentials actually live.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use cdss_api::TokenPair;

use crate::error::{CoreError, CoreResult};

/// Scoped key-value persistence for the session token pair.
///
/// `clear` must be atomic: after it returns there is no partial credential
/// left behind.
pub trait CredentialStore: Send + Sync {
    /// Loads the persisted token pair, if any.
    fn load(&self) -> CoreResult<Option<TokenPair>>;

    /// Persists the token pair, replacing any previous one.
    fn store(&self, tokens: &TokenPair) -> CoreResult<()>;

    /// Removes any persisted token pair.
    fn clear(&self) -> CoreResult<()>;
}

/// JSON-file-backed credential store.
///
/// Writes go to a sibling temp file first and are moved into place with a
/// rename, so a crash mid-write never leaves a torn credential file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> CoreResult<Option<TokenPair>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(CoreError::CredentialRead(error)),
        };

        let tokens = serde_json::from_str(&contents).map_err(CoreError::CredentialDecode)?;
        Ok(Some(tokens))
    }

    fn store(&self, tokens: &TokenPair) -> CoreResult<()> {
        let contents = serde_json::to_string(tokens).map_err(CoreError::CredentialEncode)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, contents).map_err(CoreError::CredentialWrite)?;
        std::fs::rename(&tmp, &self.path).map_err(CoreError::CredentialWrite)?;
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(CoreError::CredentialClear(error)),
        }
    }
}

/// In-memory credential store for tests and the demo shell.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a token pair, as if a prior session had
    /// persisted one.
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<TokenPair>> {
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> CoreResult<Option<TokenPair>> {
        Ok(self.guard().clone())
    }

    fn store(&self, tokens: &TokenPair) -> CoreResult<()> {
        *self.guard() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        *self.guard() = None;
        Ok(())
    }
}
