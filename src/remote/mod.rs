// Client side of the shared card record

pub mod http;

pub use http::HttpRemote;

use crate::cache::KvStore;
use crate::models::{CardStore, CardsEnvelope};
use crate::server::{CardService, ServiceError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Card service error: {0}")]
    Service(#[from] ServiceError),
}

/// Remote copy of the card store and when it was last written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub store: CardStore,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<CardsEnvelope> for RemoteSnapshot {
    fn from(envelope: CardsEnvelope) -> Self {
        Self {
            store: envelope.store,
            updated_at: envelope.updated_at,
        }
    }
}

/// The two operations the sync controller needs from the shared record
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn fetch(&self) -> Result<RemoteSnapshot, RemoteError>;
    async fn push(&self, store: &CardStore) -> Result<RemoteSnapshot, RemoteError>;
}

/// Talks to a `CardService` in the same process
pub struct InProcessRemote<K> {
    service: Arc<CardService<K>>,
}

impl<K> InProcessRemote<K> {
    pub fn new(service: Arc<CardService<K>>) -> Self {
        Self { service }
    }
}

impl<K> Clone for InProcessRemote<K> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<K: KvStore> RemoteStore for InProcessRemote<K> {
    async fn fetch(&self) -> Result<RemoteSnapshot, RemoteError> {
        Ok(self.service.fetch_current()?.envelope.into())
    }

    async fn push(&self, store: &CardStore) -> Result<RemoteSnapshot, RemoteError> {
        let body = serde_json::to_value(store)?;
        Ok(self.service.replace_value(&body)?.into())
    }
}
