//! Durable key-value storage for session state
//!
//! The session manager keeps everything it must remember across the
//! authorization redirect in a `SessionStore`: the PKCE verifier, the
//! anti-forgery state, the access token and its expiry. Nothing crosses
//! the redirect in memory.
//!
//! Reads are infallible and cheap (served from memory). Writes go through
//! `set_many`/`remove_many` so related keys (token + expiry) are committed
//! together or not at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Storage keys for persisted session entities.
pub mod keys {
    pub const VERIFIER: &str = "pkce_verifier";
    pub const STATE: &str = "pkce_state";
    pub const ACCESS_TOKEN: &str = "sp_access_token";
    /// Epoch milliseconds, decimal string
    pub const TOKEN_EXPIRY: &str = "sp_token_exp";

    pub const ALL: [&str; 4] = [VERIFIER, STATE, ACCESS_TOKEN, TOKEN_EXPIRY];
}

/// Origin-scoped durable key-value store.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Write all entries in one commit.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove all keys in one commit. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }
}

/// In-process store. State lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set_many(&self, new_entries: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON file store, written atomically with 0600 permissions.
///
/// The file is loaded once at `open`; reads are served from that snapshot.
/// A write updates the snapshot only after the file has been replaced, so a
/// failed write leaves both disk and memory at the previous state.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating an empty `{}` file if none exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading session file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded session store");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the snapshot, persist it, then commit.
    fn commit(&self, change: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        change(&mut next);
        write_atomic(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set_many(&self, new_entries: &[(&str, &str)]) -> Result<()> {
        self.commit(|entries| {
            for (key, value) in new_entries {
                entries.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.commit(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

/// Replace `path` with the serialized entries via temp file + rename.
fn write_atomic(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Storage(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Storage(format!("creating session directory: {e}")))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Storage(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Storage(format!("setting session file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), keys = entries.len(), "persisted session");
    Ok(())
}
