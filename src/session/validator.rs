//! Access-token verification.

use std::sync::Arc;

use tracing::warn;

use super::backend::AuthBackend;

#[derive(Clone)]
pub struct SessionValidator {
    backend: Arc<dyn AuthBackend>,
}

impl SessionValidator {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }

    /// True iff the backend accepts `access_token`.
    ///
    /// A missing token answers `false` without a request. Backend and network
    /// failures are logged and reported as `false`; they never propagate.
    pub async fn verify(&self, access_token: Option<&str>) -> bool {
        let Some(token) = access_token.filter(|t| !t.is_empty()) else {
            return false;
        };
        match self.backend.verify(token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "access token verification failed");
                false
            }
        }
    }
}
