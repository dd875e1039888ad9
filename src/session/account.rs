//! User-initiated account flows: sign in, register, sign out.
//!
//! ERROR HANDLING
//! ==============
//! Every failure comes back as an `AccountError` whose `Display` is fit to
//! show the user. A failed login or registration never touches the session.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use super::backend::{AuthBackend, AuthError, Registration};
use super::context::{SessionContext, SessionError, SessionSnapshot};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("email and password are required")]
    MissingCredentials,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("all fields must be filled in")]
    MissingFields,
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("registration failed: {0}")]
    RegistrationRejected(String),
    #[error("could not reach the server: {0}")]
    Unreachable(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Check a registration form before anything is sent.
pub fn validate_registration(email: &str, password: &str, confirm: &str) -> Result<Registration, AccountError> {
    if email.is_empty() || password.is_empty() || confirm.is_empty() {
        return Err(AccountError::MissingFields);
    }
    if !is_valid_email(email) {
        return Err(AccountError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    if password != confirm {
        return Err(AccountError::PasswordMismatch);
    }
    Ok(Registration { email: email.to_owned(), password1: password.to_owned(), password2: confirm.to_owned() })
}

#[derive(Clone)]
pub struct AccountService {
    backend: Arc<dyn AuthBackend>,
    context: SessionContext,
}

impl AccountService {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, context: SessionContext) -> Self {
        Self { backend, context }
    }

    /// Exchange credentials for a token pair and start a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionSnapshot, AccountError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }

        let pair = self.backend.obtain_tokens(email, password).await.map_err(|e| {
            warn!(error = %e, "login failed");
            login_error(e)
        })?;

        Ok(self.context.login(&pair.access, &pair.refresh, None, None)?)
    }

    /// Validate and submit a registration. Does not sign in.
    pub async fn register(&self, email: &str, password: &str, confirm: &str) -> Result<serde_json::Value, AccountError> {
        let registration = validate_registration(email.trim(), password, confirm)?;
        let created = self.backend.register(&registration).await.map_err(|e| {
            warn!(error = %e, "registration failed");
            match e {
                AuthError::Rejected { body, .. } => AccountError::RegistrationRejected(body),
                other => AccountError::Unreachable(other.to_string()),
            }
        })?;
        info!("account registered");
        Ok(created)
    }

    pub fn logout(&self) -> Result<(), AccountError> {
        Ok(self.context.logout()?)
    }
}

fn login_error(e: AuthError) -> AccountError {
    match e {
        AuthError::Rejected { .. } => AccountError::InvalidCredentials,
        other => AccountError::Unreachable(other.to_string()),
    }
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
