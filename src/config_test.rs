use std::sync::{Mutex, MutexGuard, PoisonError};

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serializes env mutation across the tests in this file.
fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers must hold `env_lock()`.
unsafe fn clear_client_env() {
    unsafe {
        std::env::remove_var("TRAINING_ADMIN_BASE_URL");
        std::env::remove_var("TRAINING_ADMIN_SESSION_FILE");
        std::env::remove_var("TRAINING_ADMIN_VALIDATE_INTERVAL_SECS");
        std::env::remove_var("TRAINING_ADMIN_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("TRAINING_ADMIN_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _env = env_lock();
    unsafe { clear_client_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.validate_interval, Duration::from_secs(DEFAULT_VALIDATE_INTERVAL_SECS));
    assert_eq!(
        cfg.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert!(cfg.session_file.ends_with("session.json") || cfg.session_file.ends_with(FALLBACK_SESSION_FILE));
}

#[test]
fn from_env_parses_overrides() {
    let _env = env_lock();
    unsafe {
        clear_client_env();
        std::env::set_var("TRAINING_ADMIN_BASE_URL", "http://localhost:8000/api/");
        std::env::set_var("TRAINING_ADMIN_SESSION_FILE", "/tmp/ta-session.json");
        std::env::set_var("TRAINING_ADMIN_VALIDATE_INTERVAL_SECS", "5");
        std::env::set_var("TRAINING_ADMIN_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("TRAINING_ADMIN_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "http://localhost:8000/api");
    assert_eq!(cfg.session_file, PathBuf::from("/tmp/ta-session.json"));
    assert_eq!(cfg.validate_interval, Duration::from_secs(5));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_client_env() };
}

#[test]
fn from_env_unparseable_number_uses_default() {
    let _env = env_lock();
    unsafe {
        clear_client_env();
        std::env::set_var("TRAINING_ADMIN_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_client_env() };
}

#[test]
fn from_env_zero_interval_errors() {
    let _env = env_lock();
    unsafe {
        clear_client_env();
        std::env::set_var("TRAINING_ADMIN_VALIDATE_INTERVAL_SECS", "0");
    }

    let err = ClientConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::ZeroInterval));

    unsafe { clear_client_env() };
}

#[test]
fn from_env_rejects_non_http_base_url() {
    let _env = env_lock();
    unsafe {
        clear_client_env();
        std::env::set_var("TRAINING_ADMIN_BASE_URL", "ftp://example.test");
    }

    let err = ClientConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("invalid base URL"));

    unsafe { clear_client_env() };
}

#[test]
fn normalize_base_url_trims_slashes_and_whitespace() {
    assert_eq!(normalize_base_url(" https://api.test/v1// ").unwrap(), "https://api.test/v1");
}

#[test]
fn with_base_url_applies_normalization() {
    let _env = env_lock();
    unsafe { clear_client_env() };
    let cfg = ClientConfig::from_env().unwrap().with_base_url("http://127.0.0.1:9/api/").unwrap();
    assert_eq!(cfg.base_url, "http://127.0.0.1:9/api");
    assert!(ClientConfig::from_env().unwrap().with_base_url("localhost").is_err());
}

#[test]
fn http_client_builds() {
    let _env = env_lock();
    unsafe { clear_client_env() };
    let cfg = ClientConfig::from_env().unwrap();
    assert!(cfg.http_client().is_ok());
}
