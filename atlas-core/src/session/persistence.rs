//! Durable storage for the session list
//!
//! A [`KeyValueStore`] is the raw substrate: named slots holding strings.
//! [`SlotPersistence`] puts the session codec on top of one slot and is the
//! [`SessionPersistence`] port the session store depends on.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::codec::{decode_sessions, encode_sessions};
use super::store::Session;
use crate::utils::{ensure_dir, safe_filename};

/// Slot key used by the remote deployment
pub const CHATS_KEY: &str = "planet-atlas-chats";

/// Slot key used by the simulated (demo) deployment
pub const DEMO_CHATS_KEY: &str = "planet-atlas-demo-chats";

/// String slots addressed by key
pub trait KeyValueStore: Send + Sync {
    /// Read a slot; `None` if it was never written
    fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Overwrite a slot
    fn set(&self, key: &str, value: &str) -> crate::Result<()>;
}

/// One file per slot under a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(key)))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let path = self.slot_path(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.slot_path(key);
        // Slot is replaced atomically via rename
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process slots, lost on exit
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistence port of the session store.
///
/// Neither operation fails: load degrades to an empty list and save failures
/// are logged.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Vec<Session>;
    fn save(&self, sessions: &[Session]);
}

/// Session list stored as JSON in a single key-value slot
pub struct SlotPersistence {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SlotPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl SessionPersistence for SlotPersistence {
    fn load(&self) -> Vec<Session> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Failed to read session slot {}: {}", self.key, e);
                return Vec::new();
            }
        };

        match decode_sessions(&raw) {
            Ok(sessions) => {
                debug!("Loaded {} sessions from {}", sessions.len(), self.key);
                sessions
            }
            Err(e) => {
                warn!("Ignoring session slot {}: {}", self.key, e);
                Vec::new()
            }
        }
    }

    fn save(&self, sessions: &[Session]) {
        let raw = match encode_sessions(sessions) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to encode sessions: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &raw) {
            error!("Failed to write session slot {}: {}", self.key, e);
        }
    }
}
