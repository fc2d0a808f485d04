// Key-value storage backends and the local card cache

pub mod local;
pub mod memory;
pub mod sqlite;

pub use local::{LoadSource, LocalCache, LocalLoad, LEGACY_STORAGE_KEYS, STORAGE_KEY};
pub use memory::MemoryStore;
pub use sqlite::CacheDb;

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Lock error")]
    Lock,
}

/// String blob storage addressed by key
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove(key)
    }
}
