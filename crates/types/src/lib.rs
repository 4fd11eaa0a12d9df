//! Foundational validated types shared across the CDSS front-end core.
//!
//! This crate holds the role enumeration and the validated menu code newtype.
//! Both are deliberately free of any session or networking concerns so that
//! every other crate can depend on them without pulling in the runtime stack.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a role from its wire spelling.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    /// The input did not match any known role spelling.
    #[error("unknown role: {0}")]
    Unknown(String),
}

/// Errors that can occur when creating a validated menu code.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// The input code was empty or contained only whitespace
    #[error("menu code cannot be empty")]
    Empty,
    /// The input code contained internal whitespace
    #[error("menu code cannot contain whitespace")]
    Whitespace,
}

/// The fixed set of principal roles recognised by the CDSS.
///
/// The serialized spellings match the values the backend issues
/// (`SYSTEMMANAGER`, `ADMIN`, `DOCTOR`, `NURSE`, `RIS`, `LIS`, `PATIENT`).
/// Anything outside this set is rejected at the boundary rather than carried
/// around as an unchecked string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// System manager; treated as universally authorised by the route layer.
    SystemManager,
    /// Administrator of users, roles and menu permissions.
    Admin,
    /// Doctor.
    Doctor,
    /// Nurse.
    Nurse,
    /// Imaging department staff (RIS).
    Ris,
    /// Laboratory department staff (LIS).
    Lis,
    /// Patient accessing their own records.
    Patient,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 7] = [
        Role::SystemManager,
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Ris,
        Role::Lis,
        Role::Patient,
    ];

    /// The spelling used on the wire and in persisted credentials.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::SystemManager => "SYSTEMMANAGER",
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::Nurse => "NURSE",
            Role::Ris => "RIS",
            Role::Lis => "LIS",
            Role::Patient => "PATIENT",
        }
    }

    /// Human-readable name for headers and logs.
    pub fn display_name(self) -> &'static str {
        match self {
            Role::SystemManager => "System Manager",
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Nurse => "Nurse",
            Role::Ris => "RIS",
            Role::Lis => "LIS",
            Role::Patient => "Patient",
        }
    }

    /// Whether this role bypasses individual menu grants.
    pub fn is_system_manager(self) -> bool {
        matches!(self, Role::SystemManager)
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.wire_name() == s)
            .ok_or_else(|| RoleError::Unknown(s.to_owned()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A validated menu/permission node identifier.
///
/// Codes are trimmed on construction and must be non-empty with no internal
/// whitespace (e.g. `ADMIN_USER`, `PATIENT_LIST`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuCode(String);

impl MenuCode {
    /// Creates a new `MenuCode` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. An empty
    /// result or a code with internal whitespace is rejected.
    pub fn new(input: impl AsRef<str>) -> Result<Self, CodeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CodeError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(CodeError::Whitespace);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MenuCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MenuCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for MenuCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MenuCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MenuCode::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names_round_trip() {
        for role in Role::ALL {
            let parsed: Role = role.wire_name().parse().expect("wire name parses back");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "JANITOR".parse::<Role>().expect_err("expected parse failure");
        assert!(matches!(err, RoleError::Unknown(_)));
    }

    #[test]
    fn role_serde_uses_wire_spelling() {
        let json = serde_json::to_string(&Role::SystemManager).expect("serializes");
        assert_eq!(json, "\"SYSTEMMANAGER\"");
        let back: Role = serde_json::from_str("\"RIS\"").expect("deserializes");
        assert_eq!(back, Role::Ris);
    }

    #[test]
    fn menu_code_trims_input() {
        let code = MenuCode::new("  ADMIN_USER ").expect("valid code");
        assert_eq!(code.as_str(), "ADMIN_USER");
    }

    #[test]
    fn menu_code_rejects_empty_and_whitespace() {
        assert!(matches!(MenuCode::new("   "), Err(CodeError::Empty)));
        assert!(matches!(
            MenuCode::new("ADMIN USER"),
            Err(CodeError::Whitespace)
        ));
    }
}
