//! Database layer for Frontdesk

mod connection;
mod migrations;
mod outbox;
mod settings_repository;
mod store;

pub use connection::Database;
pub use outbox::{OutboxQueue, SqliteOutboxQueue};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository, SyncSettings};
pub use store::{LocalStore, SqliteLocalStore};
