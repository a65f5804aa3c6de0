//! Shared database service wrapper used by the sync engine and clients.
//!
//! All local-store and outbox access suspends here: the replica lives behind
//! an async mutex, and each call constructs the repository it needs on the
//! borrowed connection.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::db::{
    Database, LocalStore, OutboxQueue, SettingsRepository, SqliteLocalStore, SqliteOutboxQueue,
    SqliteSettingsRepository, SyncSettings,
};
use crate::error::Result;
use crate::models::{EntityKind, EntityPayload, OutboxOp, Reservation, SyncMeta};

/// Thread-safe service for replica and outbox operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Insert or replace a record in the replica.
    pub async fn upsert_local(&self, payload: &EntityPayload, synced: bool) -> Result<()> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).upsert(payload, synced)
    }

    /// Fetch a record by kind and id.
    pub async fn get_local(&self, kind: EntityKind, id: &str) -> Result<Option<EntityPayload>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).get(kind, id)
    }

    /// All records of one kind.
    pub async fn scan_local(&self, kind: EntityKind) -> Result<Vec<EntityPayload>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).scan(kind)
    }

    /// Remove a record from the replica.
    pub async fn remove_local(&self, kind: EntityKind, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).remove(kind, id)
    }

    /// Flip a record's `synced` flag after remote acknowledgement.
    pub async fn mark_synced(&self, kind: EntityKind, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).mark_synced(kind, id)
    }

    /// Sync metadata for a record.
    pub async fn local_meta(&self, kind: EntityKind, id: &str) -> Result<Option<SyncMeta>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).meta(kind, id)
    }

    /// Number of records of one kind.
    pub async fn count_local(&self, kind: EntityKind) -> Result<u64> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).count(kind)
    }

    /// Reservations occupying a room.
    pub async fn reservations_for_room(&self, room_id: &str) -> Result<Vec<Reservation>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).reservations_for_room(room_id)
    }

    /// Reservations billed to a client.
    pub async fn reservations_for_client(&self, client_id: &str) -> Result<Vec<Reservation>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).reservations_for_client(client_id)
    }

    /// Non-cancelled reservations overlapping a date window.
    pub async fn reservations_overlapping(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reservation>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).reservations_overlapping(from, to)
    }

    /// All non-cancelled reservations.
    pub async fn active_reservations(&self) -> Result<Vec<Reservation>> {
        let db = self.db.lock().await;
        SqliteLocalStore::new(db.connection()).active_reservations()
    }

    /// Append an outbox op, returning its sequence id.
    pub async fn enqueue_outbox(&self, op: &OutboxOp) -> Result<i64> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).enqueue(op)
    }

    /// Pending outbox ops in FIFO order.
    pub async fn pending_outbox(&self) -> Result<Vec<OutboxOp>> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).pending()
    }

    /// Remove an acknowledged outbox op.
    pub async fn ack_outbox(&self, seq: i64) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).ack(seq)
    }

    /// Record a failed push attempt for an outbox op.
    pub async fn mark_outbox_failed(&self, seq: i64) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).mark_failed(seq)
    }

    /// Number of pending outbox ops.
    pub async fn outbox_len(&self) -> Result<u64> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).len()
    }

    /// Whether any pending outbox op touches the given entity.
    pub async fn outbox_has_pending_for(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        SqliteOutboxQueue::new(db.connection()).has_pending_for(kind, id)
    }

    /// Load sync-subsystem settings.
    pub async fn load_settings(&self) -> Result<SyncSettings> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).load()
    }

    /// Save sync-subsystem settings.
    pub async fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).save(settings)
    }
}
