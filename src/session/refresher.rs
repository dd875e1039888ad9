//! Silent access-token renewal.
//!
//! ERROR HANDLING
//! ==============
//! No retries: a failed refresh (rejection or transport error alike) ends
//! the cycle with `Rejected`, and the caller decides whether that ends the
//! session. A renewal that arrives after its session ended is dropped as
//! `Superseded` and never reaches the store.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::backend::AuthBackend;
use super::context::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshResult {
    /// New access token, already persisted.
    Renewed(String),
    /// Missing refresh token, backend refusal, network error or failed write.
    Rejected,
    /// The session that asked for the refresh is gone.
    Superseded,
}

#[derive(Clone)]
pub struct TokenRefresher {
    backend: Arc<dyn AuthBackend>,
    context: SessionContext,
}

impl TokenRefresher {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, context: SessionContext) -> Self {
        Self { backend, context }
    }

    /// Renew the current session's access token from `refresh_token`.
    ///
    /// Returns the new token once it is persisted, `None` otherwise.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Option<String> {
        let epoch = self.context.snapshot().epoch;
        match self.refresh_for(epoch, refresh_token).await {
            RefreshResult::Renewed(token) => Some(token),
            RefreshResult::Rejected | RefreshResult::Superseded => None,
        }
    }

    /// Renew on behalf of the session identified by `epoch`.
    pub async fn refresh_for(&self, epoch: u64, refresh_token: Option<&str>) -> RefreshResult {
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return RefreshResult::Rejected;
        };

        let access = match self.backend.refresh(refresh_token).await {
            Ok(access) => access,
            Err(e) => {
                error!(error = %e, "access token refresh failed");
                return RefreshResult::Rejected;
            }
        };

        match self.context.apply_refreshed_token(epoch, refresh_token, &access) {
            Ok(true) => {
                info!("access token refreshed");
                RefreshResult::Renewed(access)
            }
            Ok(false) => {
                debug!(epoch, "refresh resolved after its session ended");
                RefreshResult::Superseded
            }
            Err(e) => {
                error!(error = %e, "could not persist refreshed access token");
                RefreshResult::Rejected
            }
        }
    }
}
