//! Database migrations

use crate::error::Result;
use crate::models::EntityKind;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: entity tables, outbox, settings
fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut sql = String::from(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY
         );",
    );

    // One durable table per entity kind: JSON payload plus sync metadata.
    for kind in EntityKind::ALL {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 id TEXT PRIMARY KEY,
                 payload TEXT NOT NULL,
                 synced INTEGER NOT NULL DEFAULT 0,
                 last_modified INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_synced ON {table}(synced);",
            table = kind.table_name()
        ));
    }

    sql.push_str(
        "CREATE TABLE IF NOT EXISTS outbox (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             entity_table TEXT NOT NULL,
             entity_id TEXT NOT NULL,
             action TEXT NOT NULL,
             payload TEXT,
             enqueued_at INTEGER NOT NULL,
             retry_count INTEGER NOT NULL DEFAULT 0
         );
         CREATE INDEX IF NOT EXISTS idx_outbox_entity ON outbox(entity_table, entity_id);
         CREATE TABLE IF NOT EXISTS settings (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    );

    conn.execute_batch(&sql)?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: indexed lookup columns for reservations.
///
/// The store extracts room/client/date/status columns from the payload on
/// every upsert so availability queries never scan JSON.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
         ALTER TABLE reservations ADD COLUMN room_id TEXT NOT NULL DEFAULT '';
         ALTER TABLE reservations ADD COLUMN client_id TEXT NOT NULL DEFAULT '';
         ALTER TABLE reservations ADD COLUMN check_in TEXT NOT NULL DEFAULT '';
         ALTER TABLE reservations ADD COLUMN check_out TEXT NOT NULL DEFAULT '';
         ALTER TABLE reservations ADD COLUMN status TEXT NOT NULL DEFAULT 'confirmed';
         CREATE INDEX IF NOT EXISTS idx_reservations_room ON reservations(room_id);
         CREATE INDEX IF NOT EXISTS idx_reservations_client ON reservations(client_id);
         CREATE INDEX IF NOT EXISTS idx_reservations_dates ON reservations(check_in, check_out);
         INSERT INTO schema_version (version) VALUES (2);
         COMMIT;",
    )?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
