//! Durable client-side key/value storage for the session.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

/// Storage key holding the bearer access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key holding the serialized user profile.
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("failed to persist session store: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Key/value store backing the session.
///
/// Implementations must be safe to call from any task; every method is
/// synchronous and short.
pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Implementation-specific read failure.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    /// Implementation-specific write failure.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Implementation-specific write failure.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Drop every entry.
    ///
    /// # Errors
    /// Implementation-specific write failure.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// Store persisted as a single JSON object file.
///
/// The file is read once on [`open`](Self::open); every write replaces it
/// atomically through a temporary file in the same directory, so a crash
/// never leaves a half-written session behind. Temporary files are created
/// owner-readable only.
///
/// Writes are synchronous and run on the calling thread, async tasks
/// included. The file holds three short strings and changes only on login,
/// refresh and logout, so a write costs one small file replace. The entry
/// lock is held across the write, which serializes writers: the file on disk
/// always matches the last in-memory state and no update is lost.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] when the file exists but cannot be read and
    /// [`StoreError::Corrupt`] when it is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = entries.len(), "session store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), entries)?;
        tmp.as_file_mut().flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Apply `apply` to a copy of the entries, persist it, then publish it.
    /// The in-memory map is left untouched when the write fails.
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        apply(&mut next);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(BTreeMap::clear)
    }
}
