//! Shared session state.
//!
//! DESIGN
//! ======
//! `SessionContext` is a cheap cloneable handle; every consumer holds a clone
//! of the one instance built at startup, so there is no per-consumer copy to
//! drift from the store. The in-memory fields sit behind a `std::sync::Mutex`
//! that is never held across an `.await`; store writes happen under that
//! lock, so the store and memory always change together. Those writes are
//! synchronous file IO on the calling thread, which is fine for the handful
//! of writes a session makes but should not sit in a hot async path.
//!
//! Lifecycle: `Uninitialized -> {Unauthenticated, Authenticated}`, login and
//! logout move between the two, and `dispose` is terminal.
//!
//! Every login, logout and dispose bumps `epoch`. Background work captures
//! the epoch it started under and may only write back while it still
//! matches, which keeps a refresh that resolves after logout from
//! resurrecting the session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::claims::decode_identity;
use super::role::UserRole;
use super::store::{StoreError, TokenStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Unauthenticated,
    Authenticated,
    Disposed,
}

/// What consumers observe. Tokens are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub role: UserRole,
    pub user_id: Option<String>,
    pub epoch: u64,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

/// Tokens captured for one verify/refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub epoch: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("both an access token and a refresh token are required")]
    IncompleteTokenPair,
    #[error("session has been disposed")]
    Disposed,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("administrator role required")]
    Forbidden,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    access_token: Option<String>,
    refresh_token: Option<String>,
    role: UserRole,
    user_id: Option<String>,
    epoch: u64,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { state: self.state, role: self.role, user_id: self.user_id.clone(), epoch: self.epoch }
    }

    fn reset(&mut self, state: SessionState) {
        self.state = state;
        self.access_token = None;
        self.refresh_token = None;
        self.role = UserRole::default();
        self.user_id = None;
        self.epoch += 1;
    }
}

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<Inner>>,
    store: TokenStore,
    updates: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionContext {
    /// Build an uninitialized context over `store`. Call `initialize` before use.
    #[must_use]
    pub fn new(store: TokenStore) -> Self {
        let inner = Inner {
            state: SessionState::Uninitialized,
            access_token: None,
            refresh_token: None,
            role: UserRole::default(),
            user_id: None,
            epoch: 0,
        };
        let (updates, _) = watch::channel(inner.snapshot());
        Self { inner: Arc::new(Mutex::new(inner)), store, updates: Arc::new(updates) }
    }

    /// Build and initialize in one step.
    #[must_use]
    pub fn open(store: TokenStore) -> Self {
        let ctx = Self::new(store);
        ctx.initialize();
        ctx
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.snapshot());
    }

    /// Read the store and settle into `Authenticated` or `Unauthenticated`.
    /// Only the first call has an effect.
    pub fn initialize(&self) -> SessionState {
        let mut inner = self.lock();
        if inner.state != SessionState::Uninitialized {
            return inner.state;
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "session store unreadable; starting signed out");
                Default::default()
            }
        };

        inner.epoch += 1;
        if let Some(access) = stored.access_token {
            inner.state = SessionState::Authenticated;
            inner.access_token = Some(access);
            inner.refresh_token = stored.refresh_token;
            inner.role = stored.user_role.unwrap_or_default();
            inner.user_id = stored.user_id;
            debug!(role = %inner.role, "session restored from store");
        } else {
            inner.state = SessionState::Unauthenticated;
        }
        self.publish(&inner);
        inner.state
    }

    /// Start a session. Role and user id fall back to the access token's claims.
    ///
    /// Nothing changes in memory unless the store write succeeds.
    pub fn login(
        &self,
        access_token: &str,
        refresh_token: &str,
        role: Option<UserRole>,
        user_id: Option<String>,
    ) -> Result<SessionSnapshot, SessionError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SessionError::IncompleteTokenPair);
        }

        let claims = decode_identity(access_token);
        let role = role.or(claims.role).unwrap_or_default();
        let user_id = user_id.or(claims.user_id);

        let mut inner = self.lock();
        if inner.state == SessionState::Disposed {
            return Err(SessionError::Disposed);
        }
        self.store
            .save_with_identity(access_token, refresh_token, Some(role), user_id.as_deref())?;

        inner.state = SessionState::Authenticated;
        inner.access_token = Some(access_token.to_owned());
        inner.refresh_token = Some(refresh_token.to_owned());
        inner.role = role;
        inner.user_id = user_id;
        inner.epoch += 1;
        self.publish(&inner);
        info!(role = %role, "signed in");
        Ok(inner.snapshot())
    }

    /// End the session from any state. In-memory state is reset even if
    /// clearing the store fails; the error is still reported.
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state == SessionState::Disposed {
            return Ok(());
        }
        self.end_session(&mut inner).map_err(SessionError::from)
    }

    /// Log out only if `epoch` still names the current authenticated session.
    /// Returns whether a logout happened.
    pub fn logout_if_current(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if inner.state != SessionState::Authenticated || inner.epoch != epoch {
            debug!(epoch, current = inner.epoch, "stale logout ignored");
            return false;
        }
        if let Err(e) = self.end_session(&mut inner) {
            warn!(error = %e, "failed to clear session store during forced logout");
        }
        true
    }

    fn end_session(&self, inner: &mut Inner) -> Result<(), StoreError> {
        let cleared = self.store.clear();
        let was_authenticated = inner.state == SessionState::Authenticated;
        inner.reset(SessionState::Unauthenticated);
        self.publish(inner);
        if was_authenticated {
            info!("signed out");
        }
        cleared
    }

    /// Store an access token minted from `refresh_token` for the session
    /// identified by `epoch`.
    ///
    /// Returns `Ok(false)` without writing if that session has ended, either
    /// here or in the store. When the store no longer holds `refresh_token`
    /// (another process signed out or in), the in-memory session is dropped
    /// too and the store is left to its new owner.
    pub fn apply_refreshed_token(
        &self,
        epoch: u64,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<bool, SessionError> {
        let mut inner = self.lock();
        if inner.state != SessionState::Authenticated || inner.epoch != epoch {
            debug!(epoch, current = inner.epoch, "discarding refreshed token for ended session");
            return Ok(false);
        }
        if !self.store.update_access_token(refresh_token, access_token)? {
            warn!("stored session changed outside this process; signing out locally");
            inner.reset(SessionState::Unauthenticated);
            self.publish(&inner);
            return Ok(false);
        }
        inner.access_token = Some(access_token.to_owned());
        Ok(true)
    }

    /// Terminal teardown. The store is left as is so the next process can
    /// resume; every later mutation is a no-op or `Disposed`.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Disposed {
            return;
        }
        inner.reset(SessionState::Disposed);
        self.publish(&inner);
        debug!("session context disposed");
    }

    /// Tokens for a verify/refresh cycle, if a session is active.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let inner = self.lock();
        if inner.state != SessionState::Authenticated {
            return None;
        }
        let access_token = inner.access_token.clone()?;
        Some(Credentials { access_token, refresh_token: inner.refresh_token.clone(), epoch: inner.epoch })
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        let inner = self.lock();
        if inner.state == SessionState::Authenticated { inner.access_token.clone() } else { None }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == SessionState::Disposed
    }

    #[must_use]
    pub fn role(&self) -> UserRole {
        self.lock().role
    }

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.lock().user_id.clone()
    }

    /// Receiver that yields a new snapshot after every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Route guard for any signed-in screen.
    pub fn require_authenticated(&self) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.snapshot();
        match snapshot.state {
            SessionState::Authenticated => Ok(snapshot),
            SessionState::Disposed => Err(SessionError::Disposed),
            SessionState::Uninitialized | SessionState::Unauthenticated => Err(SessionError::NotAuthenticated),
        }
    }

    /// Route guard for admin-only screens.
    pub fn require_admin(&self) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.require_authenticated()?;
        if snapshot.role.is_admin() { Ok(snapshot) } else { Err(SessionError::Forbidden) }
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
