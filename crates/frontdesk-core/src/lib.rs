//! frontdesk-core - Local-first synchronization core for Frontdesk
//!
//! This crate contains the durable local replica, the outbox of pending local
//! mutations, the push/pull reconciliation engine against the remote
//! authoritative store, and the room/date overlap conflict detector. It is a
//! library consumed by the UI layers; it has no surface of its own.

pub mod conflict;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;

pub use error::{Error, Result};
pub use models::{EntityKind, EntityPayload, Reservation, ReservationStatus};
pub use sync::{ReservationStaging, SyncEngine, SyncSummary};
