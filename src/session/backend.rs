//! Authentication endpoints of the training backend.
//!
//! The `AuthBackend` trait is the seam between session logic and HTTP:
//! validator, refresher and account flows only see the trait, so they can
//! be driven by a scripted backend in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ConfigError};

pub const LOGIN_PATH: &str = "/auth/token/";
pub const VERIFY_PATH: &str = "/auth/token/verify/";
pub const REFRESH_PATH: &str = "/auth/token/refresh/";
pub const REGISTER_PATH: &str = "/auth/register/";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// True when the backend answered and refused, as opposed to being unreachable.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Access/refresh pair returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Payload of `POST /auth/register/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a token pair.
    async fn obtain_tokens(&self, email: &str, password: &str) -> Result<TokenPair, AuthError>;

    /// Succeeds iff the backend still accepts `access_token`.
    async fn verify(&self, access_token: &str) -> Result<(), AuthError>;

    /// Mint a new access token from `refresh_token`.
    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;

    /// Create an account. Returns the created user payload as sent by the backend.
    async fn register(&self, registration: &Registration) -> Result<serde_json::Value, AuthError>;
}

// =============================================================================
// HTTP BACKEND
// =============================================================================

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Clone)]
pub struct HttpAuthBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthBackend {
    /// `base_url` is the API root, e.g. `https://host/api`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.http_client()?, &config.base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, AuthError> {
        let resp = self.http.post(self.url(path)).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn obtain_tokens(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let resp = self
            .post(LOGIN_PATH, serde_json::json!({ "email": email, "password": password }))
            .await?;
        resp.json::<TokenPair>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    async fn verify(&self, access_token: &str) -> Result<(), AuthError> {
        self.post(VERIFY_PATH, serde_json::json!({ "token": access_token }))
            .await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let resp = self
            .post(REFRESH_PATH, serde_json::json!({ "refresh": refresh_token }))
            .await?;
        let body: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if body.access.is_empty() {
            return Err(AuthError::InvalidResponse("empty access token".to_owned()));
        }
        Ok(body.access)
    }

    async fn register(&self, registration: &Registration) -> Result<serde_json::Value, AuthError> {
        let body = serde_json::to_value(registration).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let resp = self.post(REGISTER_PATH, body).await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|_| AuthError::InvalidResponse(format!("unexpected response: {text}")))
    }
}
