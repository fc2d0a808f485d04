// Local card cache with fallback to older storage keys

use super::{CacheError, KvStore};
use crate::models::CardStore;
use crate::sanitize::sanitize;
use serde_json::Value;

pub const STORAGE_KEY: &str = "xianyu-card-storage-v5";

/// Older schema keys, newest first. Read only, never written or cleared.
pub const LEGACY_STORAGE_KEYS: [&str; 2] = [
    "xianyu-card-storage-v3", // per-type ids and templates, no duplicate count
    "xianyu-card-storage-v2", // two fixed types
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    Current,
    Legacy(&'static str),
    Empty,
    /// Something was stored but could not be read; defaults were used
    Recovered(String),
}

#[derive(Debug, Clone)]
pub struct LocalLoad {
    pub store: CardStore,
    pub source: LoadSource,
}

impl LocalLoad {
    fn defaults(source: LoadSource) -> Self {
        Self {
            store: CardStore::default(),
            source,
        }
    }
}

pub struct LocalCache<K> {
    kv: K,
}

impl<K: KvStore> LocalCache<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> LocalLoad {
        match self.kv.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    return LocalLoad {
                        store: sanitize(&value),
                        source: LoadSource::Current,
                    }
                }
                Err(e) => {
                    tracing::warn!("Clearing unreadable local cache entry: {}", e);
                    if let Err(e) = self.kv.remove(STORAGE_KEY) {
                        tracing::warn!("Failed to clear local cache entry: {}", e);
                    }
                    return LocalLoad::defaults(LoadSource::Recovered(format!(
                        "unreadable cache entry: {}",
                        e
                    )));
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Local cache read failed: {}", e);
                return LocalLoad::defaults(LoadSource::Recovered(e.to_string()));
            }
        }

        for key in LEGACY_STORAGE_KEYS {
            let raw = match self.kv.get(key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Local cache read of {} failed: {}", key, e);
                    continue;
                }
            };

            return match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    tracing::info!("Migrating local cache from {}", key);
                    LocalLoad {
                        store: sanitize(&value),
                        source: LoadSource::Legacy(key),
                    }
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable legacy cache {}: {}", key, e);
                    LocalLoad::defaults(LoadSource::Recovered(format!(
                        "unreadable legacy entry {}: {}",
                        key, e
                    )))
                }
            };
        }

        LocalLoad::defaults(LoadSource::Empty)
    }

    pub fn save(&self, store: &CardStore) -> Result<(), CacheError> {
        let raw = serde_json::to_string(store)?;
        self.kv.put(STORAGE_KEY, &raw)
    }
}
