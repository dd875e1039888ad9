use super::*;

#[test]
fn default_role_is_normal() {
    assert_eq!(UserRole::default(), UserRole::Normal);
}

#[test]
fn from_code_recognizes_admin() {
    assert_eq!(UserRole::from_code("1"), UserRole::Admin);
    assert_eq!(UserRole::from_code(" 1 "), UserRole::Admin);
    assert_eq!(UserRole::from_code("ADMIN"), UserRole::Admin);
}

#[test]
fn from_code_unknown_falls_back_to_normal() {
    for raw in ["0", "", "2", "root", "-1"] {
        assert_eq!(UserRole::from_code(raw), UserRole::Normal, "raw={raw:?}");
    }
}

#[test]
fn code_matches_persisted_layout() {
    assert_eq!(UserRole::Normal.code(), 0);
    assert_eq!(UserRole::Admin.code(), 1);
}

#[test]
fn serializes_as_integer() {
    assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "1");
    assert_eq!(serde_json::to_string(&UserRole::Normal).unwrap(), "0");
}

#[test]
fn deserializes_from_integer_or_string() {
    let admin: UserRole = serde_json::from_str("1").unwrap();
    let normal: UserRole = serde_json::from_str("0").unwrap();
    let text: UserRole = serde_json::from_str("\"1\"").unwrap();
    assert_eq!(admin, UserRole::Admin);
    assert_eq!(normal, UserRole::Normal);
    assert_eq!(text, UserRole::Admin);
}

#[test]
fn display_is_lowercase_label() {
    assert_eq!(UserRole::Admin.to_string(), "admin");
    assert_eq!(UserRole::Normal.to_string(), "normal");
}
