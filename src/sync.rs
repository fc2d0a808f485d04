// Reconciliation between the in-memory store, the local cache and the shared record

use crate::cache::{KvStore, LoadSource, LocalCache};
use crate::commands::{self, CommandError, CopiedCard};
use crate::models::{format_timestamp, now_millis, CardStore};
use crate::remote::{RemoteError, RemoteStore};
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Synced(DateTime<Utc>),
    /// Last pull failed; working from the local copy
    UsingLocalCache,
    /// Last push failed; a manual push retries it
    SaveFailed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "Not synced"),
            SyncStatus::Syncing => write!(f, "Syncing..."),
            SyncStatus::Synced(at) => write!(f, "Synced ({})", format_timestamp(at)),
            SyncStatus::UsingLocalCache => {
                write!(f, "Remote unreachable, using local cache")
            }
            SyncStatus::SaveFailed => write!(f, "Save to remote failed, retry later"),
        }
    }
}

/// `pending` is only true inside `pull`/`push`; observers follow it through
/// `SyncController::subscribe`, where it shows up as `SyncStatus::Syncing`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub pending: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSummary {
    pub total: usize,
    pub copied: usize,
}

/// Owns the card store and keeps it in step with the local cache and the remote.
///
/// Pull replaces the in-memory store wholesale (remote wins). Every mutation
/// saves locally and pushes the full store; the last push to land wins.
pub struct SyncController<R, K> {
    remote: R,
    local: LocalCache<K>,
    store: CardStore,
    active_type: String,
    state: SyncState,
    status: SyncStatus,
    status_tx: watch::Sender<SyncStatus>,
}

impl<R: RemoteStore, K: KvStore> SyncController<R, K> {
    /// Start from whatever the local cache holds
    pub fn open(remote: R, local: LocalCache<K>) -> Self {
        let loaded = local.load();
        match &loaded.source {
            LoadSource::Current => tracing::debug!("Loaded local cache"),
            LoadSource::Legacy(key) => tracing::info!("Loaded legacy local cache {}", key),
            LoadSource::Empty => tracing::debug!("No local cache, starting from defaults"),
            LoadSource::Recovered(reason) => {
                tracing::warn!("Local cache recovered to defaults: {}", reason)
            }
        }

        let active_type = loaded.store.first_type_id().unwrap_or_default().to_string();
        Self {
            remote,
            local,
            store: loaded.store,
            active_type,
            state: SyncState::default(),
            status: SyncStatus::Idle,
            status_tx: watch::channel(SyncStatus::Idle).0,
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn active_type(&self) -> &str {
        &self.active_type
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.state
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Follow status changes while a pull or push is in flight
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn select_type(&mut self, type_id: &str) -> Result<(), CommandError> {
        if !self.store.has_type(type_id) {
            return Err(CommandError::UnknownType(type_id.to_string()));
        }
        self.active_type = type_id.to_string();
        Ok(())
    }

    pub fn summary(&self, type_id: &str) -> CardSummary {
        let cards = self.store.cards_of(type_id);
        CardSummary {
            total: cards.len(),
            copied: cards.iter().filter(|c| c.copied).count(),
        }
    }

    /// Replace local state with the remote record
    pub async fn pull(&mut self) -> Result<(), RemoteError> {
        self.begin();
        let result = self.remote.fetch().await;
        self.state.pending = false;

        match result {
            Ok(snapshot) => {
                self.store = snapshot.store.normalized();
                self.ensure_active_type();
                self.mark_synced(snapshot.updated_at);
                self.save_local();
                tracing::info!("Pulled {} card types from remote", self.store.card_types.len());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Pull failed, keeping local state: {}", e);
                self.set_status(SyncStatus::UsingLocalCache);
                Err(e)
            }
        }
    }

    /// Send the full store to the remote. Never retried automatically.
    pub async fn push(&mut self) -> Result<(), RemoteError> {
        self.begin();
        let result = self.remote.push(&self.store).await;
        self.state.pending = false;

        match result {
            Ok(snapshot) => {
                self.mark_synced(snapshot.updated_at);
                self.save_local();
                tracing::debug!("Pushed card store to remote");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Push failed: {}", e);
                self.set_status(SyncStatus::SaveFailed);
                Err(e)
            }
        }
    }

    pub async fn import(&mut self, type_id: &str, raw: &str) -> Result<usize, CommandError> {
        let added = commands::import_cards(&mut self.store, type_id, raw)?;
        self.active_type = type_id.to_string();
        self.commit().await;
        Ok(added)
    }

    pub async fn copy(&mut self, type_id: &str, index: usize) -> Result<CopiedCard, CommandError> {
        let copied = commands::copy_card(&mut self.store, type_id, index)?;
        self.commit().await;
        Ok(copied)
    }

    /// Clear copied cards from the active type
    pub async fn clear_copied(&mut self) -> Result<usize, CommandError> {
        let type_id = self.active_type.clone();
        let removed = commands::clear_copied(&mut self.store, &type_id)?;
        self.commit().await;
        Ok(removed)
    }

    pub async fn add_type(
        &mut self,
        name: &str,
        allow_duplicate: bool,
        duplicate_count: i64,
    ) -> Result<String, CommandError> {
        let id = commands::add_type(&mut self.store, name, allow_duplicate, duplicate_count)?;
        self.active_type = id.clone();
        self.commit().await;
        Ok(id)
    }

    pub async fn update_type_settings(
        &mut self,
        type_id: &str,
        allow_duplicate: bool,
        duplicate_count: i64,
    ) -> Result<usize, CommandError> {
        let removed = commands::update_type_settings(
            &mut self.store,
            type_id,
            allow_duplicate,
            duplicate_count,
        )?;
        self.commit().await;
        Ok(removed)
    }

    pub async fn rename_type(&mut self, type_id: &str, name: &str) -> Result<(), CommandError> {
        commands::rename_type(&mut self.store, type_id, name)?;
        self.commit().await;
        Ok(())
    }

    pub async fn delete_type(&mut self, type_id: &str) -> Result<(), CommandError> {
        commands::delete_type(&mut self.store, type_id)?;
        self.commit().await;
        Ok(())
    }

    pub async fn update_template(&mut self, type_id: &str, text: &str) -> Result<(), CommandError> {
        commands::update_template(&mut self.store, type_id, text)?;
        self.commit().await;
        Ok(())
    }

    fn begin(&mut self) {
        self.state.pending = true;
        self.set_status(SyncStatus::Syncing);
    }

    fn set_status(&mut self, status: SyncStatus) {
        self.status_tx.send_replace(status.clone());
        self.status = status;
    }

    fn mark_synced(&mut self, updated_at: Option<DateTime<Utc>>) {
        let at = updated_at.unwrap_or_else(now_millis);
        self.state.last_synced_at = Some(at);
        self.set_status(SyncStatus::Synced(at));
    }

    fn ensure_active_type(&mut self) {
        if !self.store.has_type(&self.active_type) {
            self.active_type = self.store.first_type_id().unwrap_or_default().to_string();
        }
    }

    fn save_local(&self) {
        if let Err(e) = self.local.save(&self.store) {
            tracing::warn!("Failed to save local cache: {}", e);
        }
    }

    // Consistency pass, local save, then push; push failures only change the status
    async fn commit(&mut self) {
        self.store = self.store.normalized();
        self.ensure_active_type();
        self.save_local();
        let _ = self.push().await;
    }
}
