//! Remote authoritative store surface
//!
//! The core consumes an abstract row-oriented remote store; the wire rows
//! are JSON values translated by the [`adapter`] module. The concrete
//! protocol lives in [`http`]; tests substitute an in-memory double.

pub mod adapter;
mod http;

pub use http::HttpRemoteStore;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::Result;
use crate::models::EntityKind;

/// Operations the sync core needs from the remote authoritative store
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Complete current remote set for one entity table
    async fn select_all(&self, kind: EntityKind) -> Result<Vec<Value>>;

    /// Idempotent insert-or-update keyed by the row's id
    async fn upsert(&self, kind: EntityKind, row: Value) -> Result<()>;

    /// Delete by id; deleting an absent id is a no-op
    async fn delete_by_id(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Reservations on a room whose stay overlaps `[check_in, check_out)`.
    ///
    /// Used only by the remote conflict check, which must not act on the
    /// possibly stale local replica.
    async fn reservations_overlapping(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Value>>;
}

/// Binary online/offline probe against the remote store
#[allow(async_fn_in_trait)]
pub trait ConnectivityProbe {
    /// Re-probe connectivity; a probe never errors, it reports reachability
    async fn check(&self) -> bool;
}
