use super::*;

// =============================================================================
// TokenStore over memory
// =============================================================================

#[test]
fn empty_store_loads_all_absent() {
    let store = TokenStore::in_memory();
    let loaded = store.load().unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn save_then_load_returns_both_tokens() {
    let store = TokenStore::in_memory();
    store.save("A", "R").unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(
        loaded,
        StoredSession { access_token: Some("A".into()), refresh_token: Some("R".into()), user_role: None, user_id: None }
    );
}

#[test]
fn save_overwrites_prior_session_and_drops_identity() {
    let store = TokenStore::in_memory();
    store.save_with_identity("A1", "R1", Some(UserRole::Admin), Some("9")).unwrap();
    store.save("A2", "R2").unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded.access_token.as_deref(), Some("A2"));
    assert_eq!(loaded.refresh_token.as_deref(), Some("R2"));
    assert_eq!(loaded.user_role, None);
    assert_eq!(loaded.user_id, None);
}

#[test]
fn identity_is_persisted_with_role_code() {
    let storage = Arc::new(MemoryStorage::new());
    let store = TokenStore { storage: storage.clone() };
    store.save_with_identity("A", "R", Some(UserRole::Admin), Some("17")).unwrap();

    let raw = storage.read_entries().unwrap();
    assert_eq!(raw.get(USER_ROLE_KEY).map(String::as_str), Some("1"));
    assert_eq!(raw.get(USER_ID_KEY).map(String::as_str), Some("17"));

    let loaded = store.load().unwrap();
    assert_eq!(loaded.user_role, Some(UserRole::Admin));
    assert_eq!(loaded.user_id.as_deref(), Some("17"));
}

#[test]
fn update_access_token_keeps_refresh_token() {
    let store = TokenStore::in_memory();
    store.save("A", "R").unwrap();
    assert!(store.update_access_token("R", "A2").unwrap());
    let loaded = store.load().unwrap();
    assert_eq!(loaded.access_token.as_deref(), Some("A2"));
    assert_eq!(loaded.refresh_token.as_deref(), Some("R"));
}

#[test]
fn update_access_token_skips_cleared_store() {
    let store = TokenStore::in_memory();
    store.save("A", "R").unwrap();
    store.clear().unwrap();

    assert!(!store.update_access_token("R", "A2").unwrap());
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn update_access_token_skips_replaced_session() {
    let store = TokenStore::in_memory();
    store.save("A", "R").unwrap();
    store.save("B", "S").unwrap();

    assert!(!store.update_access_token("R", "A2").unwrap());
    assert_eq!(store.load().unwrap().access_token.as_deref(), Some("B"));
}

#[test]
fn clear_removes_all_session_keys() {
    let store = TokenStore::in_memory();
    store.save_with_identity("A", "R", Some(UserRole::Normal), Some("3")).unwrap();
    store.clear().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn clear_is_idempotent() {
    let store = TokenStore::in_memory();
    store.clear().unwrap();
    store.clear().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn clear_leaves_foreign_keys() {
    let storage = Arc::new(MemoryStorage::new());
    let mut seed = Entries::new();
    seed.insert("theme".into(), "dark".into());
    storage.write_entries(&seed).unwrap();

    let store = TokenStore { storage: storage.clone() };
    store.save("A", "R").unwrap();
    store.clear().unwrap();

    let raw = storage.read_entries().unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw.get("theme").map(String::as_str), Some("dark"));
}

#[test]
fn empty_values_load_as_absent() {
    let storage = Arc::new(MemoryStorage::new());
    let mut seed = Entries::new();
    seed.insert(ACCESS_TOKEN_KEY.into(), String::new());
    storage.write_entries(&seed).unwrap();
    let store = TokenStore { storage };
    assert_eq!(store.load().unwrap().access_token, None);
}

// =============================================================================
// FileStorage
// =============================================================================

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    TokenStore::file(&path).save_with_identity("A", "R", Some(UserRole::Admin), None).unwrap();

    let reopened = TokenStore::file(&path).load().unwrap();
    assert_eq!(reopened.access_token.as_deref(), Some("A"));
    assert_eq!(reopened.refresh_token.as_deref(), Some("R"));
    assert_eq!(reopened.user_role, Some(UserRole::Admin));
}

#[test]
fn file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::file(dir.path().join("absent.json"));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn file_store_corrupt_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, b"{not json").unwrap();
    assert!(TokenStore::file(&path).load().unwrap().is_empty());
}

#[test]
fn file_store_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    TokenStore::file(&path).save("A", "R").unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["session.json".to_owned()]);
}

#[test]
fn file_store_clear_writes_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = TokenStore::file(&path);
    store.save("A", "R").unwrap();
    store.clear().unwrap();

    let raw: Entries = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(raw.is_empty());
}

#[cfg(unix)]
#[test]
fn file_store_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    TokenStore::file(&path).save("A", "R").unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
