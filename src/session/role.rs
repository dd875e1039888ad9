//! User role codes as persisted under the `userRole` key.

use std::fmt;

/// Role of the signed-in principal.
///
/// Stored and transmitted as an integer code (`0` normal, `1` admin). Only
/// used for UI-level gating; the backend re-checks authority on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "RawRole", into = "u8")]
pub enum UserRole {
    #[default]
    Normal,
    Admin,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawRole {
    Code(u64),
    Text(String),
}

impl From<RawRole> for UserRole {
    fn from(raw: RawRole) -> Self {
        match raw {
            RawRole::Code(1) => Self::Admin,
            RawRole::Code(_) => Self::Normal,
            RawRole::Text(text) => Self::from_code(&text),
        }
    }
}

impl From<UserRole> for u8 {
    fn from(role: UserRole) -> Self {
        role.code()
    }
}

impl UserRole {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Admin => 1,
        }
    }

    /// Parse a persisted role code. Anything other than `1`/`admin` is `Normal`.
    #[must_use]
    pub fn from_code(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "1" || raw.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
