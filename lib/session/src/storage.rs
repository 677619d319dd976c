//! Key/value storage tiers backing the session store.
//!
//! The client keeps its state in two tiers, mirroring the browser's
//! `localStorage` (durable, shared by every tab of the origin) and
//! `sessionStorage` (private to one tab, gone when it closes).
//!
//! Native hosts get the same shape from:
//! - [`MemoryStorage`]: a plain in-memory map (per-session tier)
//! - [`FileStorage`]: a JSON file (durable tier for the CLI)
//! - [`SharedStorage`]: wraps a durable backend and publishes
//!   [`StorageEvent`]s to every other tab, like the DOM `storage` event

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;
use tradeportal_core::{Result, TabId};

/// Capacity of the in-process storage event bus.
const EVENT_BUS_CAPACITY: usize = 64;

/// Which storage tier a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Survives restarts and is visible to every tab.
    Durable,
    /// Private to one tab and dropped with it.
    PerSession,
}

impl StorageTier {
    /// Both tiers, durable first.
    pub const ALL: [StorageTier; 2] = [StorageTier::Durable, StorageTier::PerSession];
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::PerSession => write!(f, "per-session"),
        }
    }
}

/// A string key/value store.
///
/// Implementations must tolerate removing keys that do not exist.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn poisoned(key: &str) -> StorageError {
    StorageError::ReadFailed {
        key: key.to_string(),
        reason: "storage lock poisoned".to_string(),
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.remove(key);
        Ok(())
    }
}

/// Durable storage persisted as a JSON object of strings.
///
/// The whole map is rewritten on every change; the store only ever holds a
/// handful of session keys.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
                    reason: format!("{}: {e}", path.display()),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(StorageError::Unavailable {
                    tier: StorageTier::Durable,
                    reason: format!("{}: {e}", path.display()),
                }
                .into());
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, key: &str, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(entries).map_err(|e| write_failed(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| write_failed(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(key, &entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        if entries.remove(key).is_some() {
            self.persist(key, &entries)?;
        }
        Ok(())
    }
}

/// A change to a shared storage key, as seen by other tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change; `None` when the key was removed.
    pub new_value: Option<String>,
    /// The tab that made the change, when known.
    ///
    /// Browser `storage` events never reach the writing tab, so events
    /// forwarded from the DOM carry `None`.
    pub source: Option<TabId>,
}

/// Durable storage shared by several tabs in one process.
///
/// Every effective change made through a [`TabStorage`] handle is
/// published to subscribers. Writing a value identical to the current one
/// publishes nothing, matching browser behavior.
pub struct SharedStorage {
    inner: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StorageEvent>,
}

impl SharedStorage {
    /// Wraps a durable backend.
    #[must_use]
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Arc::new(Self { inner, events })
    }

    /// Creates a shared store backed by memory.
    #[must_use]
    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Returns a handle whose writes are attributed to `tab`.
    #[must_use]
    pub fn for_tab(self: &Arc<Self>, tab: TabId) -> TabStorage {
        TabStorage {
            tab,
            shared: Arc::clone(self),
        }
    }

    /// Subscribes to changes made by any tab.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StorageEvent) {
        debug!(key = %event.key, removed = event.new_value.is_none(), "storage change");
        // No subscribers is fine: a lone tab has nobody to notify.
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for SharedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStorage")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

/// One tab's view of a [`SharedStorage`].
#[derive(Debug, Clone)]
pub struct TabStorage {
    tab: TabId,
    shared: Arc<SharedStorage>,
}

impl TabStorage {
    /// Returns the owning tab.
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }
}

impl KeyValueStore for TabStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.shared.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old_value = self.shared.inner.get(key)?;
        if old_value.as_deref() == Some(value) {
            return Ok(());
        }
        self.shared.inner.set(key, value)?;
        self.shared.publish(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value: Some(value.to_string()),
            source: Some(self.tab),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let Some(old_value) = self.shared.inner.get(key)? else {
            return Ok(());
        };
        self.shared.inner.remove(key)?;
        self.shared.publish(StorageEvent {
            key: key.to_string(),
            old_value: Some(old_value),
            new_value: None,
            source: Some(self.tab),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        assert!(store.get("k").expect("get").is_none());

        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));

        store.remove("k").expect("remove");
        assert!(store.get("k").expect("get").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn memory_storage_remove_missing_is_ok() {
        let store = MemoryStorage::new();
        store.remove("never-set").expect("remove");
    }

    #[test]
    fn file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let store = FileStorage::open(&path).expect("open");
        store.set("auth.email", "alice@example.com").expect("set");
        drop(store);

        let reopened = FileStorage::open(&path).expect("reopen");
        assert_eq!(
            reopened.get("auth.email").expect("get").as_deref(),
            Some("alice@example.com")
        );

        reopened.remove("auth.email").expect("remove");
        let again = FileStorage::open(&path).expect("reopen");
        assert!(again.get("auth.email").expect("get").is_none());
    }

    #[test]
    fn file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1, 2, 3]").expect("write");

        let err = FileStorage::open(&path).expect_err("should reject");
        assert!(matches!(err.current_context(), StorageError::Corrupt { .. }));
    }

    #[test]
    fn tab_storage_publishes_changes_with_source() {
        let shared = SharedStorage::in_memory();
        let tab = TabId::new();
        let storage = shared.for_tab(tab);
        let mut events = shared.subscribe();

        storage.set("k", "1").expect("set");
        storage.remove("k").expect("remove");

        let set = events.try_recv().expect("set event");
        assert_eq!(set.key, "k");
        assert_eq!(set.new_value.as_deref(), Some("1"));
        assert_eq!(set.source, Some(tab));

        let removed = events.try_recv().expect("remove event");
        assert_eq!(removed.old_value.as_deref(), Some("1"));
        assert!(removed.new_value.is_none());
    }

    #[test]
    fn tab_storage_skips_no_op_changes() {
        let shared = SharedStorage::in_memory();
        let storage = shared.for_tab(TabId::new());
        storage.set("k", "same").expect("set");

        let mut events = shared.subscribe();
        storage.set("k", "same").expect("set again");
        storage.remove("missing").expect("remove missing");

        assert!(events.try_recv().is_err());
    }

    #[test]
    fn tabs_share_values() {
        let shared = SharedStorage::in_memory();
        let a = shared.for_tab(TabId::new());
        let b = shared.for_tab(TabId::new());

        a.set("auth.role", "trader").expect("set");
        assert_eq!(b.get("auth.role").expect("get").as_deref(), Some("trader"));
    }
}
