//! Identity claims read from an access token payload.
//!
//! The payload is decoded without signature verification. Role and user id
//! obtained this way gate UI affordances only; the backend stays the
//! authority on every request.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use super::role::UserRole;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaims {
    pub user_id: Option<String>,
    pub role: Option<UserRole>,
}

/// Extract `user_id` and role hints from a JWT-shaped access token.
///
/// Opaque (non-JWT) tokens and malformed payloads yield empty claims.
#[must_use]
pub fn decode_identity(token: &str) -> IdentityClaims {
    let Some(payload) = token.split('.').nth(1) else {
        return IdentityClaims::default();
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return IdentityClaims::default();
    };
    let Ok(Value::Object(claims)) = serde_json::from_slice::<Value>(&bytes) else {
        return IdentityClaims::default();
    };

    let user_id = claims.get("user_id").and_then(id_to_string);
    let role = claims
        .get("role")
        .or_else(|| claims.get("tipo_usuario"))
        .and_then(role_from_value)
        .or_else(|| staff_flag(&claims));

    IdentityClaims { user_id, role }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn role_from_value(value: &Value) -> Option<UserRole> {
    match value {
        Value::Number(n) => Some(if n.as_u64() == Some(1) { UserRole::Admin } else { UserRole::Normal }),
        Value::String(s) => Some(UserRole::from_code(s)),
        _ => None,
    }
}

fn staff_flag(claims: &serde_json::Map<String, Value>) -> Option<UserRole> {
    let is_staff = ["is_staff", "is_superuser"]
        .iter()
        .any(|key| claims.get(*key).and_then(Value::as_bool) == Some(true));
    is_staff.then_some(UserRole::Admin)
}

#[cfg(test)]
#[path = "claims_test.rs"]
mod tests;
