//! Push/pull reconciliation engine
//!
//! Orchestrates a sync cycle against the remote authoritative store:
//! connectivity check, then push (drain the outbox FIFO), then pull
//! (overwrite the replica with the remote snapshot). An explicit engine
//! instance owns its injected database service, remote store, and
//! connectivity hub; nothing here is process-global.
//!
//! At most one cycle runs at a time. A trigger arriving mid-cycle is not
//! dropped: it marks the cycle dirty and the engine runs exactly one
//! follow-up cycle after the current one finishes, however many triggers
//! arrived meanwhile.

mod connectivity;

pub use connectivity::{ConnectivityHub, Subscription};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::conflict::{self, CollisionCandidate};
use crate::error::{Error, Result};
use crate::models::{
    Client, EntityKind, EntityPayload, OutboxAction, OutboxOp, Payment, Reservation,
    ReservationStatus, ServiceCharge,
};
use crate::remote::{adapter, ConnectivityProbe, RemoteStore};
use crate::services::DatabaseService;

/// Counters for one completed sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Outbox ops confirmed by the remote store
    pub pushed: usize,
    /// Outbox ops rejected and retained for retry
    pub push_failures: usize,
    /// Remote rows written into the replica
    pub pulled: usize,
    /// Remote rows skipped because they failed to map
    pub skipped_rows: usize,
    /// Local rows removed because the remote snapshot no longer has them
    pub removed: usize,
}

/// Outcome of staging a reservation write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationStaging {
    /// Stored locally and queued for push
    Saved(Reservation),
    /// Not stored: the room is already taken for overlapping dates.
    /// The caller must pick another room or date, or confirm an override
    /// by re-staging with adjusted input.
    Conflict {
        /// The reservation occupying the room
        existing: Reservation,
    },
}

#[derive(Default)]
struct CycleGuard {
    running: bool,
    dirty: bool,
}

/// The sync engine; generic over the remote store implementation
pub struct SyncEngine<R> {
    db: DatabaseService,
    remote: R,
    hub: ConnectivityHub,
    guard: Arc<Mutex<CycleGuard>>,
}

impl<R: RemoteStore + ConnectivityProbe> SyncEngine<R> {
    /// Create an engine over an opened database service, a remote store, and
    /// a connectivity hub
    pub fn new(db: DatabaseService, remote: R, hub: ConnectivityHub) -> Self {
        Self {
            db,
            remote,
            hub,
            guard: Arc::new(Mutex::new(CycleGuard::default())),
        }
    }

    /// The database service this engine writes through
    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// The connectivity hub for subscribe/status consumers
    pub const fn connectivity(&self) -> &ConnectivityHub {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Connectivity surface
    // -----------------------------------------------------------------------

    /// Feed an external online/offline signal into the engine.
    ///
    /// An offline-to-online transition triggers a sync cycle.
    pub async fn set_online(&self, online: bool) {
        let transitioned = self.hub.set_online(online);
        if transitioned && online {
            self.trigger_sync().await;
        }
    }

    /// Re-probe the remote store and record the outcome.
    ///
    /// Reports reachability without triggering a sync cycle.
    pub async fn force_check(&self) -> bool {
        let online = self.remote.check().await;
        self.hub.set_online(online);
        online
    }

    // -----------------------------------------------------------------------
    // Sync cycle
    // -----------------------------------------------------------------------

    /// Run a sync cycle now.
    ///
    /// Returns `Ok(None)` when a cycle is already in progress; the running
    /// cycle will re-run once more on completion.
    pub async fn force_resync(&self) -> Result<Option<SyncSummary>> {
        self.run_guarded().await
    }

    /// Trigger a cycle and swallow failures: local work must never fail
    /// because the network did.
    async fn trigger_sync(&self) {
        if let Err(error) = self.run_guarded().await {
            tracing::warn!("sync cycle failed: {error}");
        }
    }

    async fn run_guarded(&self) -> Result<Option<SyncSummary>> {
        if !self.begin_cycle() {
            return Ok(None);
        }

        loop {
            match self.run_cycle().await {
                Ok(summary) => {
                    if !self.finish_cycle_and_check_dirty() {
                        return Ok(Some(summary));
                    }
                    // A trigger arrived mid-cycle; run the follow-up
                }
                Err(error) => {
                    self.abort_cycle();
                    return Err(error);
                }
            }
        }
    }

    /// Returns false when a cycle is already running (and marks it dirty)
    fn begin_cycle(&self) -> bool {
        let mut guard = self.lock_guard();
        if guard.running {
            guard.dirty = true;
            return false;
        }
        guard.running = true;
        true
    }

    /// Returns true when the finished cycle must run once more
    fn finish_cycle_and_check_dirty(&self) -> bool {
        let mut guard = self.lock_guard();
        if guard.dirty {
            guard.dirty = false;
            true
        } else {
            guard.running = false;
            false
        }
    }

    fn abort_cycle(&self) {
        let mut guard = self.lock_guard();
        guard.running = false;
        guard.dirty = false;
    }

    fn lock_guard(&self) -> std::sync::MutexGuard<'_, CycleGuard> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(&self) -> Result<SyncSummary> {
        if !self.remote.check().await {
            self.hub.set_online(false);
            return Err(Error::Connectivity("remote store unreachable".to_string()));
        }
        self.hub.set_online(true);

        let mut summary = SyncSummary::default();
        self.push(&mut summary).await?;
        self.pull(&mut summary).await?;

        tracing::info!(
            pushed = summary.pushed,
            push_failures = summary.push_failures,
            pulled = summary.pulled,
            skipped = summary.skipped_rows,
            removed = summary.removed,
            "sync cycle complete"
        );
        Ok(summary)
    }

    /// Drain the outbox in FIFO order. A rejected op is retained with its
    /// retry count incremented and never blocks the ops behind it.
    async fn push(&self, summary: &mut SyncSummary) -> Result<()> {
        for op in self.db.pending_outbox().await? {
            match self.push_op(&op).await {
                Ok(()) => {
                    self.db.ack_outbox(op.seq).await?;
                    if op.action != OutboxAction::Delete {
                        self.db.mark_synced(op.kind, &op.entity_id).await?;
                    }
                    summary.pushed += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        seq = op.seq,
                        table = %op.kind,
                        entity_id = %op.entity_id,
                        "push failed, keeping op queued: {error}"
                    );
                    self.db.mark_outbox_failed(op.seq).await?;
                    summary.push_failures += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_op(&self, op: &OutboxOp) -> Result<()> {
        match op.action {
            OutboxAction::Create | OutboxAction::Update => {
                let payload = op.payload.as_ref().ok_or_else(|| {
                    Error::InvalidInput(format!("outbox op {} has no payload", op.seq))
                })?;
                let row = adapter::to_remote(payload)?;
                self.remote.upsert(op.kind, row).await
            }
            OutboxAction::Delete => self.remote.delete_by_id(op.kind, &op.entity_id).await,
        }
    }

    /// Overwrite the replica with the full remote snapshot, table by table.
    ///
    /// Unmappable rows are skipped but still count as present in the
    /// snapshot, so their local records survive. Local rows absent from the
    /// snapshot are removed unless an outbox op still references them; those
    /// will be re-asserted by their next successful push.
    async fn pull(&self, summary: &mut SyncSummary) -> Result<()> {
        for kind in EntityKind::ALL {
            let rows = self.remote.select_all(kind).await?;
            let mut seen = HashSet::with_capacity(rows.len());

            for row in rows {
                match adapter::from_remote(kind, &row) {
                    Ok(payload) => {
                        seen.insert(payload.id().to_string());
                        self.db.upsert_local(&payload, true).await?;
                        summary.pulled += 1;
                    }
                    Err(error) => {
                        tracing::warn!(table = %kind, "skipping unmappable remote row: {error}");
                        summary.skipped_rows += 1;
                        // The entity is still in the snapshot; shield its
                        // local record from the deletion pass below
                        if let Ok(id) = adapter::remote_row_id(&row) {
                            seen.insert(id);
                        }
                    }
                }
            }

            for payload in self.db.scan_local(kind).await? {
                let id = payload.id();
                if seen.contains(id) {
                    continue;
                }
                if self.db.outbox_has_pending_for(kind, id).await? {
                    continue;
                }
                self.db.remove_local(kind, id).await?;
                summary.removed += 1;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Local mutation paths
    // -----------------------------------------------------------------------

    /// Save an entity: write it optimistically to the replica, enqueue an
    /// outbox op, and trigger a cycle when online.
    ///
    /// A client's stored ledger balance survives this call; balances move
    /// only through [`Self::charge_client`] and [`Self::settle_client`].
    pub async fn save_entity(&self, mut payload: EntityPayload) -> Result<EntityPayload> {
        if let EntityPayload::Client(client) = &mut payload {
            let existing = self
                .db
                .get_local(EntityKind::Clients, &client.id)
                .await?
                .and_then(EntityPayload::into_client);
            if let Some(existing) = existing {
                client.balance_cents = existing.balance_cents;
            }
        }
        self.persist_and_enqueue(payload).await
    }

    /// Delete an entity locally and enqueue the remote delete
    pub async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<()> {
        if self.db.get_local(kind, id).await?.is_none() {
            return Err(Error::NotFound(format!("{kind}/{id}")));
        }
        self.db.remove_local(kind, id).await?;
        self.db.enqueue_outbox(&OutboxOp::delete(kind, id)).await?;
        self.maybe_trigger().await;
        Ok(())
    }

    /// Save a reservation after checking the room/date invariant against the
    /// local replica.
    ///
    /// A collision is a normal outcome, not an error: the caller must choose
    /// a different room or date.
    pub async fn stage_reservation(&self, reservation: Reservation) -> Result<ReservationStaging> {
        if reservation.check_in >= reservation.check_out {
            return Err(Error::InvalidInput(
                "check-out must be after check-in".to_string(),
            ));
        }

        if reservation.is_active() {
            let candidate = CollisionCandidate::for_edit(&reservation);
            let active = self.db.active_reservations().await?;
            if let Some(existing) = conflict::find_collision(&candidate, &active) {
                return Ok(ReservationStaging::Conflict {
                    existing: existing.clone(),
                });
            }
        }

        let saved = self
            .persist_and_enqueue(EntityPayload::Reservation(reservation))
            .await?
            .into_reservation()
            .ok_or_else(|| Error::InvalidInput("expected a reservation payload".to_string()))?;
        Ok(ReservationStaging::Saved(saved))
    }

    /// Change a reservation's status.
    ///
    /// Reviving a cancelled reservation re-runs the collision check, since
    /// its room may have been rebooked meanwhile.
    pub async fn set_reservation_status(
        &self,
        reservation_id: &str,
        status: ReservationStatus,
    ) -> Result<ReservationStaging> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        let was_blocking = reservation.is_active();
        reservation.status = status;

        if !was_blocking && reservation.is_active() {
            return self.stage_reservation(reservation).await;
        }

        let saved = self
            .persist_and_enqueue(EntityPayload::Reservation(reservation))
            .await?
            .into_reservation()
            .ok_or_else(|| Error::InvalidInput("expected a reservation payload".to_string()))?;
        Ok(ReservationStaging::Saved(saved))
    }

    /// Record a payment against a reservation
    pub async fn add_payment(&self, reservation_id: &str, payment: Payment) -> Result<Reservation> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        reservation.payments.push(payment);
        self.save_reservation_update(reservation).await
    }

    /// Remove a payment from its owning reservation
    pub async fn remove_payment(&self, reservation_id: &str, payment_id: &str) -> Result<Reservation> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        let before = reservation.payments.len();
        reservation.payments.retain(|payment| payment.id != payment_id);
        if reservation.payments.len() == before {
            return Err(Error::NotFound(format!(
                "payment {payment_id} on reservation {reservation_id}"
            )));
        }
        self.save_reservation_update(reservation).await
    }

    /// Charge a catalog service to a reservation
    pub async fn add_service_charge(
        &self,
        reservation_id: &str,
        charge: ServiceCharge,
    ) -> Result<Reservation> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        reservation.services.push(charge);
        self.save_reservation_update(reservation).await
    }

    /// Add debt to a client's ledger; `amount_cents` must be positive
    pub async fn charge_client(&self, client_id: &str, amount_cents: i64) -> Result<Client> {
        Self::require_positive(amount_cents)?;
        self.adjust_ledger(client_id, amount_cents).await
    }

    /// Settle part of a client's ledger; `amount_cents` must be positive
    pub async fn settle_client(&self, client_id: &str, amount_cents: i64) -> Result<Client> {
        Self::require_positive(amount_cents)?;
        self.adjust_ledger(client_id, -amount_cents).await
    }

    fn require_positive(amount_cents: i64) -> Result<()> {
        if amount_cents > 0 {
            Ok(())
        } else {
            Err(Error::InvalidInput(
                "ledger amount must be positive".to_string(),
            ))
        }
    }

    async fn adjust_ledger(&self, client_id: &str, delta_cents: i64) -> Result<Client> {
        let mut client = self
            .db
            .get_local(EntityKind::Clients, client_id)
            .await?
            .and_then(EntityPayload::into_client)
            .ok_or_else(|| Error::NotFound(format!("client {client_id}")))?;

        client.balance_cents += delta_cents;
        let saved = self
            .persist_and_enqueue(EntityPayload::Client(client))
            .await?
            .into_client()
            .ok_or_else(|| Error::InvalidInput("expected a client payload".to_string()))?;
        Ok(saved)
    }

    async fn load_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        self.db
            .get_local(EntityKind::Reservations, reservation_id)
            .await?
            .and_then(EntityPayload::into_reservation)
            .ok_or_else(|| Error::NotFound(format!("reservation {reservation_id}")))
    }

    async fn save_reservation_update(&self, reservation: Reservation) -> Result<Reservation> {
        self.persist_and_enqueue(EntityPayload::Reservation(reservation))
            .await?
            .into_reservation()
            .ok_or_else(|| Error::InvalidInput("expected a reservation payload".to_string()))
    }

    async fn persist_and_enqueue(&self, payload: EntityPayload) -> Result<EntityPayload> {
        let exists = self
            .db
            .get_local(payload.kind(), payload.id())
            .await?
            .is_some();
        self.db.upsert_local(&payload, false).await?;

        let op = if exists {
            OutboxOp::update(payload.clone())
        } else {
            OutboxOp::create(payload.clone())
        };
        self.db.enqueue_outbox(&op).await?;

        self.maybe_trigger().await;
        Ok(payload)
    }

    async fn maybe_trigger(&self) {
        if !self.hub.is_online() {
            return;
        }
        let auto_sync = match self.db.load_settings().await {
            Ok(settings) => settings.auto_sync,
            Err(error) => {
                tracing::warn!("failed to load sync settings: {error}");
                true
            }
        };
        if auto_sync {
            self.trigger_sync().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, Room, ServiceItem, Tax, User};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory remote store with switchable connectivity and per-entity
    /// write-failure injection
    #[derive(Clone, Default)]
    struct MemoryRemote {
        tables: Arc<Mutex<HashMap<EntityKind, BTreeMap<String, Value>>>>,
        online: Arc<AtomicBool>,
        rejected_ids: Arc<Mutex<HashSet<String>>>,
    }

    impl MemoryRemote {
        fn new(online: bool) -> Self {
            let remote = Self::default();
            remote.online.store(online, Ordering::SeqCst);
            remote
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        fn reject_writes_for(&self, id: &str) {
            self.rejected_ids.lock().unwrap().insert(id.to_string());
        }

        fn accept_writes_for(&self, id: &str) {
            self.rejected_ids.lock().unwrap().remove(id);
        }

        fn seed(&self, kind: EntityKind, payload: &EntityPayload) {
            let row = adapter::to_remote(payload).unwrap();
            self.seed_row(kind, row);
        }

        fn seed_row(&self, kind: EntityKind, row: Value) {
            let id = row["id"].as_str().unwrap().to_string();
            self.tables.lock().unwrap().entry(kind).or_default().insert(id, row);
        }

        fn rows(&self, kind: EntityKind) -> Vec<Value> {
            self.tables
                .lock()
                .unwrap()
                .get(&kind)
                .map(|table| table.values().cloned().collect())
                .unwrap_or_default()
        }

        fn require_online(&self) -> Result<()> {
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Error::Connectivity("simulated outage".to_string()))
            }
        }
    }

    impl RemoteStore for MemoryRemote {
        async fn select_all(&self, kind: EntityKind) -> Result<Vec<Value>> {
            self.require_online()?;
            Ok(self.rows(kind))
        }

        async fn upsert(&self, kind: EntityKind, row: Value) -> Result<()> {
            self.require_online()?;
            let id = adapter::remote_row_id(&row)?;
            if self.rejected_ids.lock().unwrap().contains(&id) {
                return Err(Error::RemoteWrite(format!("row {id} rejected")));
            }
            self.seed_row(kind, row);
            Ok(())
        }

        async fn delete_by_id(&self, kind: EntityKind, id: &str) -> Result<()> {
            self.require_online()?;
            // Deleting an absent id stays a no-op
            if let Some(table) = self.tables.lock().unwrap().get_mut(&kind) {
                table.remove(id);
            }
            Ok(())
        }

        async fn reservations_overlapping(
            &self,
            room_id: &str,
            check_in: NaiveDate,
            check_out: NaiveDate,
        ) -> Result<Vec<Value>> {
            self.require_online()?;
            let from = check_in.format("%Y-%m-%d").to_string();
            let to = check_out.format("%Y-%m-%d").to_string();
            Ok(self
                .rows(EntityKind::Reservations)
                .into_iter()
                .filter(|row| {
                    row["roomId"].as_str() == Some(room_id)
                        && row["arrival"].as_str().is_some_and(|arrival| arrival < to.as_str())
                        && row["departure"].as_str().is_some_and(|dep| dep > from.as_str())
                })
                .collect())
        }
    }

    impl ConnectivityProbe for MemoryRemote {
        async fn check(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine(online: bool) -> (SyncEngine<MemoryRemote>, MemoryRemote) {
        let db = DatabaseService::open_in_memory().unwrap();
        let remote = MemoryRemote::new(online);
        let hub = ConnectivityHub::new(online);
        (SyncEngine::new(db, remote.clone(), hub), remote)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_save_queues_locally() {
        let (engine, remote) = engine(false);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room.clone())).await.unwrap();

        assert_eq!(engine.database().outbox_len().await.unwrap(), 1);
        let meta = engine
            .database()
            .local_meta(EntityKind::Rooms, &room.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!meta.synced);
        assert!(remote.rows(EntityKind::Rooms).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_to_end_offline_create_then_reconnect() {
        let (engine, remote) = engine(false);

        let reservation = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        let staged = engine.stage_reservation(reservation.clone()).await.unwrap();
        assert!(matches!(staged, ReservationStaging::Saved(_)));
        assert_eq!(engine.database().outbox_len().await.unwrap(), 1);

        remote.set_online(true);
        engine.set_online(true).await;

        assert_eq!(engine.database().outbox_len().await.unwrap(), 0);
        assert_eq!(remote.rows(EntityKind::Reservations).len(), 1);
        let meta = engine
            .database()
            .local_meta(EntityKind::Reservations, &reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(meta.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_failure_does_not_block_the_queue() {
        let (engine, remote) = engine(false);

        let first = Room::new("101", "double", 1);
        let stuck = Room::new("102", "double", 1);
        let third = Room::new("103", "double", 1);
        for room in [&first, &stuck, &third] {
            engine.save_entity(EntityPayload::Room((*room).clone())).await.unwrap();
        }
        remote.reject_writes_for(&stuck.id);
        remote.set_online(true);

        let summary = engine.force_resync().await.unwrap().unwrap();
        assert_eq!(summary.pushed, 2);
        assert_eq!(summary.push_failures, 1);

        let pending = engine.database().pending_outbox().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, stuck.id);
        assert_eq!(pending[0].retry_count, 1);
        assert_eq!(remote.rows(EntityKind::Rooms).len(), 2);

        // The retained op succeeds on a later cycle
        remote.accept_writes_for(&stuck.id);
        engine.force_resync().await.unwrap().unwrap();
        assert_eq!(engine.database().outbox_len().await.unwrap(), 0);
        assert_eq!(remote.rows(EntityKind::Rooms).len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn idempotent_replay_of_the_same_upsert() {
        let (engine, remote) = engine(true);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room.clone())).await.unwrap();
        let after_first = remote.rows(EntityKind::Rooms);

        // Replaying the identical op must leave the remote state unchanged
        engine
            .database()
            .enqueue_outbox(&OutboxOp::create(EntityPayload::Room(room)))
            .await
            .unwrap();
        engine.force_resync().await.unwrap().unwrap();

        assert_eq!(remote.rows(EntityKind::Rooms), after_first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn convergence_after_one_cycle() {
        let (engine, remote) = engine(true);

        remote.seed(EntityKind::Rooms, &EntityPayload::Room(Room::new("101", "double", 1)));
        remote.seed(EntityKind::Clients, &EntityPayload::Client(Client::new("Ada")));
        remote.seed(EntityKind::Taxes, &EntityPayload::Tax(Tax::new("VAT", 190)));
        remote.seed(
            EntityKind::PaymentMethods,
            &EntityPayload::PaymentMethod(PaymentMethod::new("Cash")),
        );
        remote.seed(
            EntityKind::Services,
            &EntityPayload::Service(ServiceItem::new("Laundry", 4_50)),
        );
        remote.seed(EntityKind::Users, &EntityPayload::User(User::new("mira", "Mira", "reception")));
        remote.seed(
            EntityKind::Reservations,
            &EntityPayload::Reservation(Reservation::new(
                "room-1",
                "client-1",
                date(2024, 6, 1),
                date(2024, 6, 5),
            )),
        );

        engine.force_resync().await.unwrap().unwrap();

        for kind in EntityKind::ALL {
            let local = engine.database().scan_local(kind).await.unwrap();
            let remote_rows = remote.rows(kind);
            assert_eq!(local.len(), remote_rows.len(), "table {kind} diverged");
            for payload in local {
                let row = adapter::to_remote(&payload).unwrap();
                assert!(remote_rows.contains(&row), "row missing remotely in {kind}");
                let meta = engine
                    .database()
                    .local_meta(kind, payload.id())
                    .await
                    .unwrap()
                    .unwrap();
                assert!(meta.synced);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_removes_stale_rows_but_keeps_pending_ones() {
        let (engine, remote) = engine(false);

        // Stale row: locally present, never queued, absent remotely
        let stale = Room::new("900", "single", 9);
        engine
            .database()
            .upsert_local(&EntityPayload::Room(stale.clone()), false)
            .await
            .unwrap();

        // Pending row: saved through the engine while offline
        let pending = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(pending.clone())).await.unwrap();
        remote.reject_writes_for(&pending.id); // keep its op in the outbox

        remote.set_online(true);
        let summary = engine.force_resync().await.unwrap().unwrap();
        assert_eq!(summary.removed, 1);

        assert!(engine
            .database()
            .get_local(EntityKind::Rooms, &stale.id)
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .database()
            .get_local(EntityKind::Rooms, &pending.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unmappable_row_does_not_delete_its_local_record() {
        let (engine, remote) = engine(true);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room.clone())).await.unwrap();
        assert_eq!(engine.database().outbox_len().await.unwrap(), 0); // auto-synced

        // The remote row grows a field the mapping rejects; the entity is
        // still in the snapshot, so the replica must keep its record
        let mut row = adapter::to_remote(&EntityPayload::Room(room.clone())).unwrap();
        row["wing"] = Value::from("east");
        remote.seed_row(EntityKind::Rooms, row);

        let summary = engine.force_resync().await.unwrap().unwrap();
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(summary.removed, 0);
        assert!(engine
            .database()
            .get_local(EntityKind::Rooms, &room.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_skips_unmappable_rows_and_continues() {
        let (engine, remote) = engine(true);

        remote.seed_row(
            EntityKind::Rooms,
            serde_json::json!({ "id": "bad-row", "unexpected": true }),
        );
        remote.seed(EntityKind::Rooms, &EntityPayload::Room(Room::new("101", "double", 1)));

        let summary = engine.force_resync().await.unwrap().unwrap();
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(summary.pulled, 1);
        assert_eq!(engine.database().count_local(EntityKind::Rooms).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connectivity_failure_aborts_before_push() {
        let (engine, remote) = engine(true);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room)).await.unwrap();
        assert_eq!(engine.database().outbox_len().await.unwrap(), 0); // auto-synced

        remote.set_online(false);
        let error = engine.force_resync().await.unwrap_err();
        assert!(matches!(error, Error::Connectivity(_)));
        assert!(!engine.connectivity().is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn midcycle_trigger_coalesces_into_one_followup() {
        let (engine, _remote) = engine(true);

        // Simulate a running cycle, then several triggers arriving
        assert!(engine.begin_cycle());
        assert!(!engine.begin_cycle());
        assert!(!engine.begin_cycle());

        // The running cycle re-runs exactly once, then the guard is free
        assert!(engine.finish_cycle_and_check_dirty());
        assert!(!engine.finish_cycle_and_check_dirty());
        assert!(engine.begin_cycle());
        engine.abort_cycle();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn staging_detects_local_collision() {
        let (engine, _remote) = engine(false);

        let existing = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        engine.stage_reservation(existing.clone()).await.unwrap();

        let overlapping = Reservation::new("room-1", "client-2", date(2024, 6, 3), date(2024, 6, 4));
        let staged = engine.stage_reservation(overlapping).await.unwrap();
        match staged {
            ReservationStaging::Conflict { existing: hit } => assert_eq!(hit.id, existing.id),
            ReservationStaging::Saved(_) => panic!("expected a collision"),
        }

        // Same-day turnover stays allowed
        let touching = Reservation::new("room-1", "client-2", date(2024, 6, 5), date(2024, 6, 8));
        let staged = engine.stage_reservation(touching).await.unwrap();
        assert!(matches!(staged, ReservationStaging::Saved(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reviving_a_cancelled_reservation_rechecks_collision() {
        let (engine, _remote) = engine(false);

        let first = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        engine.stage_reservation(first.clone()).await.unwrap();
        engine
            .set_reservation_status(&first.id, ReservationStatus::Cancelled)
            .await
            .unwrap();

        // Room rebooked while the first stay was cancelled
        let second = Reservation::new("room-1", "client-2", date(2024, 6, 2), date(2024, 6, 6));
        engine.stage_reservation(second).await.unwrap();

        let revived = engine
            .set_reservation_status(&first.id, ReservationStatus::Confirmed)
            .await
            .unwrap();
        assert!(matches!(revived, ReservationStaging::Conflict { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_collision_check_bypasses_the_replica() {
        let (engine, remote) = engine(true);

        // Remote knows about a booking the replica has not pulled yet
        let remote_only = Reservation::new("room-1", "client-9", date(2024, 6, 1), date(2024, 6, 5));
        remote.seed(EntityKind::Reservations, &EntityPayload::Reservation(remote_only.clone()));
        remote.seed(EntityKind::Rooms, &EntityPayload::Room(Room::new("101", "double", 1)));
        remote.seed(EntityKind::Rooms, &EntityPayload::Room(Room::new("102", "double", 1)));

        let candidate = CollisionCandidate::new("room-1", date(2024, 6, 3), date(2024, 6, 4));
        let report = conflict::resolve_remote_collision(&remote, &candidate).await.unwrap();
        assert!(report.has_collision());
        assert_eq!(report.existing.unwrap().id, remote_only.id);
        assert_eq!(report.alternatives.len(), 2);

        // A failed remote query is an error, never "no collision"
        remote.set_online(false);
        let error = conflict::resolve_remote_collision(&remote, &candidate).await.unwrap_err();
        assert!(matches!(error, Error::Connectivity(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ledger_operations_move_the_balance() {
        let (engine, _remote) = engine(false);

        let client = Client::new("Ada");
        engine.save_entity(EntityPayload::Client(client.clone())).await.unwrap();

        let charged = engine.charge_client(&client.id, 120_00).await.unwrap();
        assert_eq!(charged.balance_cents, 120_00);
        let settled = engine.settle_client(&client.id, 50_00).await.unwrap();
        assert_eq!(settled.balance_cents, 70_00);

        // save + charge + settle
        assert_eq!(engine.database().outbox_len().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ledger_amounts_must_be_positive() {
        let (engine, _remote) = engine(false);

        let client = Client::new("Ada");
        engine.save_entity(EntityPayload::Client(client.clone())).await.unwrap();

        // Negative or zero amounts must not invert the ledger direction
        for amount in [0, -50_00] {
            let error = engine.charge_client(&client.id, amount).await.unwrap_err();
            assert!(matches!(error, Error::InvalidInput(_)));
            let error = engine.settle_client(&client.id, amount).await.unwrap_err();
            assert!(matches!(error, Error::InvalidInput(_)));
        }

        let stored = engine
            .database()
            .get_local(EntityKind::Clients, &client.id)
            .await
            .unwrap()
            .and_then(EntityPayload::into_client)
            .unwrap();
        assert_eq!(stored.balance_cents, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generic_client_save_preserves_the_ledger() {
        let (engine, _remote) = engine(false);

        let client = Client::new("Ada");
        engine.save_entity(EntityPayload::Client(client.clone())).await.unwrap();
        engine.charge_client(&client.id, 80_00).await.unwrap();

        // An edit built from a stale copy must not reset the balance
        let mut edited = client.clone();
        edited.name = "Ada L.".to_string();
        edited.balance_cents = 0;
        let saved = engine
            .save_entity(EntityPayload::Client(edited))
            .await
            .unwrap()
            .into_client()
            .unwrap();
        assert_eq!(saved.name, "Ada L.");
        assert_eq!(saved.balance_cents, 80_00);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn payments_are_added_and_really_removed() {
        let (engine, _remote) = engine(false);

        let reservation = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        engine.stage_reservation(reservation.clone()).await.unwrap();

        let payment = Payment::new("cash", 50_00, date(2024, 6, 1));
        let updated = engine.add_payment(&reservation.id, payment.clone()).await.unwrap();
        assert_eq!(updated.payments.len(), 1);

        let updated = engine.remove_payment(&reservation.id, &payment.id).await.unwrap();
        assert!(updated.payments.is_empty());

        let error = engine.remove_payment(&reservation.id, &payment.id).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn service_charges_accumulate() {
        let (engine, _remote) = engine(false);

        let reservation = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        engine.stage_reservation(reservation.clone()).await.unwrap();

        let updated = engine
            .add_service_charge(&reservation.id, ServiceCharge::new("laundry", 2, 4_50))
            .await
            .unwrap();
        assert_eq!(updated.services.len(), 1);
        assert_eq!(updated.services[0].total_cents(), 9_00);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_entity_enqueues_remote_delete() {
        let (engine, remote) = engine(true);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room.clone())).await.unwrap();
        assert_eq!(remote.rows(EntityKind::Rooms).len(), 1);

        engine.delete_entity(EntityKind::Rooms, &room.id).await.unwrap();
        assert!(remote.rows(EntityKind::Rooms).is_empty());
        assert!(engine
            .database()
            .get_local(EntityKind::Rooms, &room.id)
            .await
            .unwrap()
            .is_none());

        let error = engine.delete_entity(EntityKind::Rooms, &room.id).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn force_check_reports_without_syncing() {
        let (engine, remote) = engine(false);

        let room = Room::new("101", "double", 1);
        engine.save_entity(EntityPayload::Room(room)).await.unwrap();

        remote.set_online(true);
        assert!(engine.force_check().await);
        assert!(engine.connectivity().is_online());
        // The queued op was not pushed by the probe
        assert_eq!(engine.database().outbox_len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_reservation_interval_is_rejected() {
        let (engine, _remote) = engine(false);

        let backwards = Reservation::new("room-1", "client-1", date(2024, 6, 5), date(2024, 6, 1));
        let error = engine.stage_reservation(backwards).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(engine.database().outbox_len().await.unwrap(), 0);
    }
}
