// REST client for the shared card record

use super::{RemoteError, RemoteSnapshot, RemoteStore};
use crate::models::CardStore;
use crate::sanitize::sanitize_envelope;
use crate::server::CARDS_PATH;
use serde_json::Value;

pub struct HttpRemote {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemote {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{}", api_url.trim_end_matches('/'), CARDS_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read_snapshot(resp: reqwest::Response) -> Result<RemoteSnapshot, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        let body = resp.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        Ok(sanitize_envelope(&value).into())
    }
}

impl RemoteStore for HttpRemote {
    async fn fetch(&self) -> Result<RemoteSnapshot, RemoteError> {
        tracing::debug!("GET {}", self.endpoint);
        let resp = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        Self::read_snapshot(resp).await
    }

    async fn push(&self, store: &CardStore) -> Result<RemoteSnapshot, RemoteError> {
        tracing::debug!("PUT {} ({} types)", self.endpoint, store.card_types.len());
        let resp = self.client.put(&self.endpoint).json(store).send().await?;
        Self::read_snapshot(resp).await
    }
}
