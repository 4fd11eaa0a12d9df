//! The authenticated principal.

use cdss_api::PrincipalInfo;
use cdss_types::Role;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The authenticated actor for the current session.
///
/// Owned exclusively by the session service and handed out by value;
/// every other component treats it as read-only.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Server-side user identifier.
    pub id: String,
    pub display_name: String,
    pub role: Role,
    /// Client-side id for this login, used to correlate log lines.
    pub session_id: Uuid,
    pub authenticated_at: DateTime<Utc>,
}

impl Principal {
    pub(crate) fn from_info(info: PrincipalInfo) -> Self {
        Self {
            id: info.id,
            display_name: info.display_name,
            role: info.role,
            session_id: Uuid::new_v4(),
            authenticated_at: Utc::now(),
        }
    }
}
