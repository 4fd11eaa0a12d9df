//! Server authentication endpoints consumed by the session core.

use async_trait::async_trait;

use crate::dto::{MenuSnapshot, PrincipalInfo};
use crate::error::ApiResult;
use crate::tokens::{AccessToken, TokenPair};

/// The three auth endpoints the session core depends on.
///
/// Implementations own the actual transport (HTTP client, in-process demo
/// backend, test double); the core only sees this trait.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges a user id/password pair for a session token pair.
    async fn login(&self, user_id: &str, password: &str) -> ApiResult<TokenPair>;

    /// Describes the principal that owns the given access token.
    ///
    /// Also serves as credential validation at startup: an invalid or expired
    /// token yields [`ApiError::Unauthenticated`](crate::ApiError).
    async fn fetch_me(&self, access: &AccessToken) -> ApiResult<PrincipalInfo>;

    /// Fetches the permission tree and grant set for the current principal.
    async fn fetch_menu(&self, access: &AccessToken) -> ApiResult<MenuSnapshot>;
}
