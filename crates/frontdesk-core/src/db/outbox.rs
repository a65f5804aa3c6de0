//! Outbox queue persistence
//!
//! The outbox is an append-only FIFO log of local mutations awaiting remote
//! confirmation. Entries are removed only on `ack`; failures keep the entry
//! with an incremented retry count so the next cycle replays it.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{EntityKind, EntityPayload, OutboxAction, OutboxOp};

/// Trait for outbox storage operations
pub trait OutboxQueue {
    /// Append an op, returning its assigned sequence id
    fn enqueue(&self, op: &OutboxOp) -> Result<i64>;

    /// All pending ops in FIFO order
    fn pending(&self) -> Result<Vec<OutboxOp>>;

    /// Remove an op after the remote store confirmed it
    fn ack(&self, seq: i64) -> Result<()>;

    /// Keep an op queued and record one more failed attempt
    fn mark_failed(&self, seq: i64) -> Result<()>;

    /// Number of pending ops
    fn len(&self) -> Result<u64>;

    /// Whether the queue is empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether any pending op touches the given entity
    fn has_pending_for(&self, kind: EntityKind, entity_id: &str) -> Result<bool>;
}

/// `SQLite` implementation of `OutboxQueue`
pub struct SqliteOutboxQueue<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboxQueue<'a> {
    /// Create a new queue over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_op(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, Option<String>, i64, u32)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }
}

impl OutboxQueue for SqliteOutboxQueue<'_> {
    fn enqueue(&self, op: &OutboxOp) -> Result<i64> {
        let payload_json = op
            .payload
            .as_ref()
            .map(EntityPayload::record_json)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO outbox (entity_table, entity_id, action, payload, enqueued_at, retry_count)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                op.kind.table_name(),
                op.entity_id,
                op.action.as_str(),
                payload_json,
                op.enqueued_at,
                op.retry_count,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn pending(&self) -> Result<Vec<OutboxOp>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, entity_table, entity_id, action, payload, enqueued_at, retry_count
             FROM outbox ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], Self::parse_op)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ops = Vec::with_capacity(rows.len());
        for (seq, table, entity_id, action, payload_json, enqueued_at, retry_count) in rows {
            let kind = EntityKind::from_table_name(&table)?;
            let payload = payload_json
                .map(|json| EntityPayload::from_record_json(kind, &json))
                .transpose()?;
            ops.push(OutboxOp {
                seq,
                action: OutboxAction::parse(&action)?,
                kind,
                entity_id,
                payload,
                enqueued_at,
                retry_count,
            });
        }
        Ok(ops)
    }

    fn ack(&self, seq: i64) -> Result<()> {
        self.conn.execute("DELETE FROM outbox WHERE seq = ?", params![seq])?;
        Ok(())
    }

    fn mark_failed(&self, seq: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE outbox SET retry_count = retry_count + 1 WHERE seq = ?",
            params![seq],
        )?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn has_pending_for(&self, kind: EntityKind, entity_id: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM outbox WHERE entity_table = ? AND entity_id = ?)",
            params![kind.table_name(), entity_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Room;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_enqueue_assigns_increasing_seq() {
        let db = setup();
        let queue = SqliteOutboxQueue::new(db.connection());

        let a = queue
            .enqueue(&OutboxOp::create(EntityPayload::Room(Room::new("101", "double", 1))))
            .unwrap();
        let b = queue
            .enqueue(&OutboxOp::create(EntityPayload::Room(Room::new("102", "double", 1))))
            .unwrap();
        assert!(b > a);
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn test_pending_is_fifo() {
        let db = setup();
        let queue = SqliteOutboxQueue::new(db.connection());

        let first = Room::new("101", "double", 1);
        let second = Room::new("102", "double", 1);
        queue.enqueue(&OutboxOp::create(EntityPayload::Room(first.clone()))).unwrap();
        queue.enqueue(&OutboxOp::delete(EntityKind::Rooms, second.id.clone())).unwrap();

        let ops = queue.pending().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].entity_id, first.id);
        assert_eq!(ops[0].action, OutboxAction::Create);
        assert_eq!(ops[1].entity_id, second.id);
        assert_eq!(ops[1].action, OutboxAction::Delete);
        assert!(ops[1].payload.is_none());
    }

    #[test]
    fn test_ack_removes_entry() {
        let db = setup();
        let queue = SqliteOutboxQueue::new(db.connection());

        let seq = queue
            .enqueue(&OutboxOp::create(EntityPayload::Room(Room::new("101", "double", 1))))
            .unwrap();
        queue.ack(seq).unwrap();
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_mark_failed_increments_and_keeps_entry() {
        let db = setup();
        let queue = SqliteOutboxQueue::new(db.connection());

        let seq = queue
            .enqueue(&OutboxOp::create(EntityPayload::Room(Room::new("101", "double", 1))))
            .unwrap();
        queue.mark_failed(seq).unwrap();
        queue.mark_failed(seq).unwrap();

        let ops = queue.pending().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].retry_count, 2);
    }

    #[test]
    fn test_has_pending_for() {
        let db = setup();
        let queue = SqliteOutboxQueue::new(db.connection());

        let room = Room::new("101", "double", 1);
        queue.enqueue(&OutboxOp::create(EntityPayload::Room(room.clone()))).unwrap();

        assert!(queue.has_pending_for(EntityKind::Rooms, &room.id).unwrap());
        assert!(!queue.has_pending_for(EntityKind::Rooms, "other").unwrap());
        assert!(!queue.has_pending_for(EntityKind::Clients, &room.id).unwrap());
    }
}
