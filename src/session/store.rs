//! Durable key-value persistence of session credentials.
//!
//! DESIGN
//! ======
//! `TokenStore` speaks in session terms (`save`/`load`/`clear`) on top of a
//! flat string map provided by a `Storage` backend. Every mutation reads the
//! whole map, edits the session keys, and replaces the map in a single
//! write, so a token pair is never half-persisted.
//!
//! Storage calls are synchronous. `FileStorage` writes a few hundred bytes
//! and fsyncs, which briefly blocks the calling runtime thread.
//!
//! Layout: `authToken`, `refreshToken`, `userRole` (integer code as a
//! string) and `userId`. Keys owned by other components are left alone.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use super::role::UserRole;

pub const ACCESS_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ROLE_KEY: &str = "userRole";
pub const USER_ID_KEY: &str = "userId";

const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ROLE_KEY, USER_ID_KEY];

pub type Entries = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

// =============================================================================
// STORAGE BACKENDS
// =============================================================================

/// Flat string map that survives for as long as the backend does.
pub trait Storage: Send + Sync {
    fn read_entries(&self) -> Result<Entries, StoreError>;
    fn write_entries(&self, entries: &Entries) -> Result<(), StoreError>;
}

/// Process-local storage. Lost on exit.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Entries>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read_entries(&self) -> Result<Entries, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StoreError> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.clone();
        Ok(())
    }
}

/// JSON object on disk, replaced atomically via temp file + rename.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Storage for FileStorage {
    fn read_entries(&self) -> Result<Entries, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Entries>(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "session file unreadable; treating as empty");
                Ok(Entries::new())
            }
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(entries)?;
        let tmp = self.temp_path();
        {
            let mut file = open_private(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

// =============================================================================
// TOKEN STORE
// =============================================================================

/// Session values as found in storage. Absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_role: Option<UserRole>,
    pub user_id: Option<String>,
}

impl StoredSession {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_role.is_none() && self.user_id.is_none()
    }
}

#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self { storage: Arc::new(storage) }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    /// Persist a fresh token pair. Identity keys from any earlier session
    /// are dropped so the store never mixes two sessions.
    pub fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        self.save_with_identity(access_token, refresh_token, None, None)
    }

    /// Persist a token pair together with the derived identity, in one write.
    pub fn save_with_identity(
        &self,
        access_token: &str,
        refresh_token: &str,
        role: Option<UserRole>,
        user_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut entries = self.storage.read_entries()?;
        entries.insert(ACCESS_TOKEN_KEY.to_owned(), access_token.to_owned());
        entries.insert(REFRESH_TOKEN_KEY.to_owned(), refresh_token.to_owned());
        match role {
            Some(role) => entries.insert(USER_ROLE_KEY.to_owned(), role.code().to_string()),
            None => entries.remove(USER_ROLE_KEY),
        };
        match user_id {
            Some(id) => entries.insert(USER_ID_KEY.to_owned(), id.to_owned()),
            None => entries.remove(USER_ID_KEY),
        };
        self.storage.write_entries(&entries)
    }

    /// Replace only the access token; used by silent refresh.
    ///
    /// The write happens only while the stored refresh token is still
    /// `refresh_token`, so a refresh never lands on a store another process
    /// has since cleared or re-populated. Returns whether it was written.
    pub fn update_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError> {
        let mut entries = self.storage.read_entries()?;
        if entries.get(REFRESH_TOKEN_KEY).map(String::as_str) != Some(refresh_token) {
            return Ok(false);
        }
        entries.insert(ACCESS_TOKEN_KEY.to_owned(), access_token.to_owned());
        self.storage.write_entries(&entries)?;
        Ok(true)
    }

    pub fn load(&self) -> Result<StoredSession, StoreError> {
        let entries = self.storage.read_entries()?;
        let get = |key: &str| entries.get(key).filter(|v| !v.is_empty()).cloned();
        Ok(StoredSession {
            access_token: get(ACCESS_TOKEN_KEY),
            refresh_token: get(REFRESH_TOKEN_KEY),
            user_role: get(USER_ROLE_KEY).map(|code| UserRole::from_code(&code)),
            user_id: get(USER_ID_KEY),
        })
    }

    /// Remove every session key. Safe to call on an empty store.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.storage.read_entries()?;
        let before = entries.len();
        for key in SESSION_KEYS {
            entries.remove(key);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.storage.write_entries(&entries)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
