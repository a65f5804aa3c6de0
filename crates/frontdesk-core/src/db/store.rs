//! Local replica store
//!
//! One durable table per entity kind, each row holding the JSON record plus
//! `synced` / `last_modified` metadata. The reservations table additionally
//! carries extracted, indexed lookup columns so availability queries stay off
//! the JSON payload.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{EntityKind, EntityPayload, Reservation, SyncMeta};

/// Trait for replica storage operations
pub trait LocalStore {
    /// Insert or replace a record, stamping `last_modified`
    fn upsert(&self, payload: &EntityPayload, synced: bool) -> Result<()>;

    /// Fetch a record by kind and id
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<EntityPayload>>;

    /// All records of one kind
    fn scan(&self, kind: EntityKind) -> Result<Vec<EntityPayload>>;

    /// Remove a record; missing ids are a no-op
    fn remove(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Flip a record's `synced` flag to true after remote acknowledgement
    fn mark_synced(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Sync metadata for a record
    fn meta(&self, kind: EntityKind, id: &str) -> Result<Option<SyncMeta>>;

    /// Number of records of one kind
    fn count(&self, kind: EntityKind) -> Result<u64>;

    /// Reservations occupying a room, any status
    fn reservations_for_room(&self, room_id: &str) -> Result<Vec<Reservation>>;

    /// Reservations billed to a client, any status
    fn reservations_for_client(&self, client_id: &str) -> Result<Vec<Reservation>>;

    /// Non-cancelled reservations whose stay overlaps `[from, to)`
    fn reservations_overlapping(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>>;

    /// All non-cancelled reservations
    fn active_reservations(&self) -> Result<Vec<Reservation>>;
}

/// `SQLite` implementation of `LocalStore`
pub struct SqliteLocalStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLocalStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_payload(kind: EntityKind, json: &str) -> Result<EntityPayload> {
        EntityPayload::from_record_json(kind, json)
    }

    fn query_reservations(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Reservation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut reservations = Vec::with_capacity(rows.len());
        for json in rows {
            let payload = Self::parse_payload(EntityKind::Reservations, &json)?;
            if let Some(reservation) = payload.into_reservation() {
                reservations.push(reservation);
            }
        }
        Ok(reservations)
    }
}

impl LocalStore for SqliteLocalStore<'_> {
    fn upsert(&self, payload: &EntityPayload, synced: bool) -> Result<()> {
        let kind = payload.kind();
        let json = payload.record_json()?;
        let now = chrono::Utc::now().timestamp_millis();

        if let EntityPayload::Reservation(res) = payload {
            self.conn.execute(
                "INSERT OR REPLACE INTO reservations
                 (id, payload, synced, last_modified, room_id, client_id, check_in, check_out, status)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    res.id,
                    json,
                    i32::from(synced),
                    now,
                    res.room_id,
                    res.client_id,
                    res.check_in.format("%Y-%m-%d").to_string(),
                    res.check_out.format("%Y-%m-%d").to_string(),
                    serde_json::to_string(&res.status)?.trim_matches('"'),
                ],
            )?;
            return Ok(());
        }

        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, payload, synced, last_modified) VALUES (?, ?, ?, ?)",
            kind.table_name()
        );
        self.conn
            .execute(&sql, params![payload.id(), json, i32::from(synced), now])?;
        Ok(())
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<EntityPayload>> {
        let sql = format!("SELECT payload FROM {} WHERE id = ?", kind.table_name());
        let json: Option<String> = self
            .conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?;

        json.map(|json| Self::parse_payload(kind, &json)).transpose()
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<EntityPayload>> {
        let sql = format!("SELECT payload FROM {} ORDER BY id", kind.table_name());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter().map(|json| Self::parse_payload(kind, json)).collect()
    }

    fn remove(&self, kind: EntityKind, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.table_name());
        self.conn.execute(&sql, params![id])?;
        Ok(())
    }

    fn mark_synced(&self, kind: EntityKind, id: &str) -> Result<()> {
        let sql = format!("UPDATE {} SET synced = 1 WHERE id = ?", kind.table_name());
        self.conn.execute(&sql, params![id])?;
        Ok(())
    }

    fn meta(&self, kind: EntityKind, id: &str) -> Result<Option<SyncMeta>> {
        let sql = format!(
            "SELECT synced, last_modified FROM {} WHERE id = ?",
            kind.table_name()
        );
        let meta = self
            .conn
            .query_row(&sql, params![id], |row| {
                Ok(SyncMeta {
                    synced: row.get::<_, i32>(0)? != 0,
                    last_modified: row.get(1)?,
                })
            })
            .optional()?;
        Ok(meta)
    }

    fn count(&self, kind: EntityKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn reservations_for_room(&self, room_id: &str) -> Result<Vec<Reservation>> {
        self.query_reservations(
            "SELECT payload FROM reservations WHERE room_id = ? ORDER BY check_in",
            &[&room_id],
        )
    }

    fn reservations_for_client(&self, client_id: &str) -> Result<Vec<Reservation>> {
        self.query_reservations(
            "SELECT payload FROM reservations WHERE client_id = ? ORDER BY check_in",
            &[&client_id],
        )
    }

    fn reservations_overlapping(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>> {
        // Half-open interval overlap on the ISO-8601 date columns; string
        // comparison orders the same as the dates themselves.
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        self.query_reservations(
            "SELECT payload FROM reservations
             WHERE status != 'cancelled' AND check_in < ? AND check_out > ?
             ORDER BY check_in",
            &[&to, &from],
        )
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>> {
        self.query_reservations(
            "SELECT payload FROM reservations WHERE status != 'cancelled' ORDER BY check_in",
            &[],
        )
    }
}
