//! Key-value persistence adapter. The only component that touches the
//! storage medium. Values are JSON strings; a read that fails to parse is
//! logged and treated as absent so the app stays usable.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

/// Logical keys of the persisted records.
pub mod keys {
    pub const ACCOUNTS_DIRECTORY: &str = "accounts-directory";
    pub const CURRENT_SESSION: &str = "current-session";
    pub const GUEST_HISTORY: &str = "guest-history";
    pub const PREFERRED_LANGUAGE: &str = "preferred-language";

    pub fn plan_cache(email_key: &str) -> String {
        format!("plan-cache:{email_key}")
    }
}

/// Synchronous string-keyed storage. Single-writer, single-reader; every
/// mutating caller performs a complete read-modify-write of the record it
/// owns, so no locking beyond the implementation's own is required.
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Reads and decodes a JSON value. Corrupt data degrades to `None`.
pub fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding corrupt persisted value");
            None
        }
    }
}

pub fn set_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set_raw(key, &raw),
        Err(e) => error!(key, error = %e, "failed to serialize persisted value"),
    }
}

/// One file per key under a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KvStore for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set_raw(&self, key: &str, value: &str) {
        if let Err(e) = fs::write(self.path_for(key), value) {
            error!(key, error = %e, "failed to write persisted value");
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                error!(key, error = %e, "failed to remove persisted value");
            }
        }
    }
}

/// In-memory store for tests and embedders without a disk.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl KvStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: &str) {
        self.inner.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");
        set_json(&store, "preferred-language", &"en");
        let lang: Option<String> = get_json(&store, "preferred-language");
        assert_eq!(lang.as_deref(), Some("en"));

        store.remove("preferred-language");
        assert!(store.get_raw("preferred-language").is_none());
    }

    #[test]
    fn file_store_sanitizes_derived_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");
        let key = keys::plan_cache("user@test.com");
        store.set_raw(&key, "[]");
        assert_eq!(store.get_raw(&key).as_deref(), Some("[]"));
    }

    #[test]
    fn corrupt_value_reads_as_absent() {
        let store = MemoryStore::default();
        store.set_raw("accounts-directory", "{not json");
        let decoded: Option<std::collections::BTreeMap<String, String>> =
            get_json(&store, "accounts-directory");
        assert!(decoded.is_none());
    }

    #[test]
    fn memory_store_remove_forgets_the_key() {
        let store = MemoryStore::default();
        store.set_raw("guest-history", "[]");
        store.remove("guest-history");
        assert!(store.get_raw("guest-history").is_none());
    }
}
