//! Durable session record persistence.
//!
//! SYSTEM CONTEXT
//! ==============
//! Only `AuthContext` writes through this adapter. The record is one JSON
//! object `{ "token": ..., "user": {...} }` under a single key, overwritten
//! whole on every change.
//!
//! ERROR HANDLING
//! ==============
//! `load` never fails: absent, unreadable and corrupt records all read as
//! "no session". A record with a usable token but a damaged `user` loads as
//! a token with no cached user so startup restore can still revalidate it.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::StorageError;
use crate::types::UserRecord;

// =============================================================================
// BACKENDS
// =============================================================================

/// Key/value store shaped like browser `localStorage`.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value for `key`, `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the value exists but cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value for `key` in one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the write fails.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the removal fails.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside `dir`, replaced via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", file_stem(key), uuid::Uuid::new_v4().simple()));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options.open(&tmp).and_then(|mut file| {
            file.write_all(value.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&tmp, &target)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local backend for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value currently stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

// =============================================================================
// SESSION STORAGE
// =============================================================================

/// Session record as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    /// Cached user; `None` when the stored user could not be decoded.
    pub user: Option<UserRecord>,
}

#[derive(Serialize)]
struct PersistedRecord<'a> {
    token: &'a str,
    user: &'a UserRecord,
}

/// Reads and writes the session record under one well-known key.
#[derive(Clone)]
pub struct SessionStorage {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl SessionStorage {
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self { backend, key: key.into() }
    }

    /// File-backed storage in `dir`.
    pub fn file(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self::new(Arc::new(FileBackend::new(dir)), key)
    }

    /// Storage that lives only as long as the process.
    pub fn in_memory(key: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), key)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `{token, user}`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when encoding or the backend write fails.
    pub fn save(&self, token: &str, user: &UserRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&PersistedRecord { token, user })?;
        self.backend.set_item(&self.key, &raw)
    }

    /// Read the stored session, treating any unusable record as absent.
    #[must_use]
    pub fn load(&self) -> Option<StoredSession> {
        let raw = match self.backend.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "session record unreadable; treating as absent");
                return None;
            }
        };
        let parsed = parse_record(&raw);
        if parsed.is_none() {
            tracing::warn!(key = %self.key, "session record corrupt; treating as absent");
        }
        parsed
    }

    /// Remove the stored session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the backend removal fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove_item(&self.key)
    }
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage").field("key", &self.key).finish_non_exhaustive()
    }
}

fn parse_record(raw: &str) -> Option<StoredSession> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let token = value.get("token")?.as_str()?.trim();
    if token.is_empty() {
        return None;
    }
    let user = value
        .get("user")
        .cloned()
        .and_then(|user| serde_json::from_value::<UserRecord>(user).ok());
    Some(StoredSession { token: token.to_owned(), user })
}
