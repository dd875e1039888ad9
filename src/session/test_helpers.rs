//! Scripted `AuthBackend` for session tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::backend::{AuthBackend, AuthError, Registration, TokenPair};

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    verify_ok: AtomicBool,
    verify_unreachable: AtomicBool,
    refresh_result: Mutex<Option<String>>,
    login_result: Mutex<Option<TokenPair>>,
    register_ok: AtomicBool,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    verify_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    last_verified: Mutex<Option<String>>,
    last_refreshed: Mutex<Option<String>>,
}

fn locked<T: Clone>(m: &Mutex<T>) -> T {
    m.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn put<T>(m: &Mutex<T>, value: T) {
    *m.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

impl ScriptedBackend {
    /// Accepts every token, refreshes to nothing, rejects logins.
    pub(crate) fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.verify_ok.store(true, Ordering::SeqCst);
        backend.register_ok.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub(crate) fn set_verify_ok(&self, ok: bool) {
        self.verify_ok.store(ok, Ordering::SeqCst);
    }

    pub(crate) fn set_verify_unreachable(&self) {
        self.verify_unreachable.store(true, Ordering::SeqCst);
    }

    /// `None` makes the refresh endpoint refuse.
    pub(crate) fn set_refresh_result(&self, access: Option<&str>) {
        put(&self.refresh_result, access.map(str::to_owned));
    }

    /// `None` makes the login endpoint refuse.
    pub(crate) fn set_login_result(&self, pair: Option<TokenPair>) {
        put(&self.login_result, pair);
    }

    pub(crate) fn set_register_ok(&self, ok: bool) {
        self.register_ok.store(ok, Ordering::SeqCst);
    }

    /// Park every refresh call until the returned gate is notified.
    pub(crate) fn hold_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        put(&self.refresh_gate, Some(gate.clone()));
        gate
    }

    pub(crate) fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_verified(&self) -> Option<String> {
        locked(&self.last_verified)
    }

    pub(crate) fn last_refreshed(&self) -> Option<String> {
        locked(&self.last_refreshed)
    }

    /// Poll until at least `n` refresh calls have started.
    pub(crate) async fn wait_for_refresh_calls(&self, n: usize) {
        for _ in 0..200 {
            if self.refresh_calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {n} refresh calls, saw {}", self.refresh_calls());
    }
}

fn refused() -> AuthError {
    AuthError::Rejected { status: 401, body: r#"{"detail":"Token is invalid or expired"}"#.to_owned() }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn obtain_tokens(&self, _email: &str, _password: &str) -> Result<TokenPair, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.login_result).ok_or_else(refused)
    }

    async fn verify(&self, access_token: &str) -> Result<(), AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        put(&self.last_verified, Some(access_token.to_owned()));
        if self.verify_unreachable.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidResponse("connection refused".to_owned()));
        }
        if self.verify_ok.load(Ordering::SeqCst) { Ok(()) } else { Err(refused()) }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        put(&self.last_refreshed, Some(refresh_token.to_owned()));
        let gate = locked(&self.refresh_gate);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        locked(&self.refresh_result).ok_or_else(refused)
    }

    async fn register(&self, registration: &Registration) -> Result<serde_json::Value, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.register_ok.load(Ordering::SeqCst) {
            Ok(serde_json::json!({ "email": registration.email }))
        } else {
            Err(AuthError::Rejected { status: 400, body: r#"{"email":["already registered"]}"#.to_owned() })
        }
    }
}
