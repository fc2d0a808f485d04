// Shared card record: fetch-current and replace-current over a blob store

use crate::cache::{CacheError, KvStore};
use crate::models::{now_millis, CardsEnvelope};
use crate::sanitize::{sanitize, sanitize_envelope};
use serde_json::Value;
use thiserror::Error;

/// Key of the one shared record in the blob store
pub const STORE_KEY: &str = "shared-cards";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid JSON body: {0}")]
    InvalidBody(serde_json::Error),
    #[error("Card store binding is missing")]
    MissingBinding,
    #[error("Store error: {0}")]
    Store(#[from] CacheError),
}

/// Where a fetched record came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    Stored,
    NeverWritten,
    Corrupted(String),
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub envelope: CardsEnvelope,
    pub source: FetchSource,
}

pub struct CardService<K> {
    kv: K,
}

impl<K: KvStore> CardService<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn fetch_current(&self) -> Result<Fetched, ServiceError> {
        let Some(raw) = self.kv.get(STORE_KEY)? else {
            return Ok(Fetched {
                envelope: empty_envelope(),
                source: FetchSource::NeverWritten,
            });
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(Fetched {
                envelope: sanitize_envelope(&value),
                source: FetchSource::Stored,
            }),
            Err(e) => {
                tracing::warn!("Stored card record is unreadable: {}", e);
                Ok(Fetched {
                    envelope: empty_envelope(),
                    source: FetchSource::Corrupted(e.to_string()),
                })
            }
        }
    }

    /// Replace the record with a raw request body
    pub fn replace_current(&self, body: &[u8]) -> Result<CardsEnvelope, ServiceError> {
        let value: Value = serde_json::from_slice(body).map_err(ServiceError::InvalidBody)?;
        self.replace_value(&value)
    }

    /// Sanitize, stamp and store; missing or invalid fields are never an error
    pub fn replace_value(&self, body: &Value) -> Result<CardsEnvelope, ServiceError> {
        let envelope = CardsEnvelope {
            store: sanitize(body),
            updated_at: Some(now_millis()),
        };
        let raw = serde_json::to_string(&envelope).map_err(CacheError::from)?;
        self.kv.put(STORE_KEY, &raw)?;

        tracing::debug!(
            "Stored card record with {} types",
            envelope.store.card_types.len()
        );
        Ok(envelope)
    }
}

fn empty_envelope() -> CardsEnvelope {
    CardsEnvelope {
        store: sanitize(&Value::Null),
        updated_at: None,
    }
}
