//! Authentication and session lifecycle.
//!
//! ARCHITECTURE
//! ============
//! `store` persists credentials, `context` is the single shared session
//! state built on top of it, `validator` and `refresher` talk to the auth
//! endpoints through the `backend` seam, and `scheduler` runs the periodic
//! verify -> refresh -> logout cascade. `account` holds the user-initiated
//! flows (login, register, logout).
//!
//! `SessionRuntime` wires one of each together around a single context.

pub mod account;
pub mod backend;
pub mod claims;
pub mod context;
pub mod refresher;
pub mod role;
pub mod scheduler;
pub mod store;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

pub use account::{AccountError, AccountService};
pub use backend::{AuthBackend, AuthError, HttpAuthBackend, TokenPair};
pub use context::{SessionContext, SessionError, SessionSnapshot, SessionState};
pub use role::UserRole;
pub use scheduler::{KeeperHandle, SessionKeeper, TickOutcome};
pub use store::{StoreError, StoredSession, TokenStore};

use crate::config::{ClientConfig, ConfigError};

/// One session context plus the services that act on it.
#[derive(Clone)]
pub struct SessionRuntime {
    pub context: SessionContext,
    pub backend: Arc<dyn AuthBackend>,
    pub keeper: SessionKeeper,
    pub accounts: AccountService,
}

impl SessionRuntime {
    #[must_use]
    pub fn new(context: SessionContext, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            keeper: SessionKeeper::new(context.clone(), backend.clone()),
            accounts: AccountService::new(backend.clone(), context.clone()),
            context,
            backend,
        }
    }

    /// File-backed store at `config.session_file`, HTTP backend at `config.base_url`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let backend = Arc::new(HttpAuthBackend::from_config(config)?);
        let context = SessionContext::open(TokenStore::file(&config.session_file));
        Ok(Self::new(context, backend))
    }
}
