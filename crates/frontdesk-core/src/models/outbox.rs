//! Outbox operation model
//!
//! One row per pending local mutation, drained FIFO by the push phase.
//! Create/update ops replay as remote upserts and delete ops as
//! delete-by-id, so replay after a partial failure is idempotent.

use serde::{Deserialize, Serialize};

use super::{EntityKind, EntityPayload};
use crate::error::{Error, Result};

/// What the remote store must do for an outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxAction {
    Create,
    Update,
    Delete,
}

impl OutboxAction {
    /// Storage label for the `action` column
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse the stored label back
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown outbox action: {other}"))),
        }
    }
}

/// A pending local mutation awaiting remote confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxOp {
    /// Auto-increment sequence id; 0 until persisted
    pub seq: i64,
    /// Remote action to perform
    pub action: OutboxAction,
    /// Entity table the op belongs to
    pub kind: EntityKind,
    /// Id of the affected entity
    pub entity_id: String,
    /// Full entity for create/update; `None` for delete
    pub payload: Option<EntityPayload>,
    /// When the op was enqueued (Unix ms)
    pub enqueued_at: i64,
    /// Failed push attempts so far
    pub retry_count: u32,
}

impl OutboxOp {
    /// Build a create op from a payload
    #[must_use]
    pub fn create(payload: EntityPayload) -> Self {
        Self::with_payload(OutboxAction::Create, payload)
    }

    /// Build an update op from a payload
    #[must_use]
    pub fn update(payload: EntityPayload) -> Self {
        Self::with_payload(OutboxAction::Update, payload)
    }

    /// Build a delete op for an id
    #[must_use]
    pub fn delete(kind: EntityKind, entity_id: impl Into<String>) -> Self {
        Self {
            seq: 0,
            action: OutboxAction::Delete,
            kind,
            entity_id: entity_id.into(),
            payload: None,
            enqueued_at: chrono::Utc::now().timestamp_millis(),
            retry_count: 0,
        }
    }

    fn with_payload(action: OutboxAction, payload: EntityPayload) -> Self {
        Self {
            seq: 0,
            action,
            kind: payload.kind(),
            entity_id: payload.id().to_string(),
            payload: Some(payload),
            enqueued_at: chrono::Utc::now().timestamp_millis(),
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Room;

    #[test]
    fn test_action_labels_round_trip() {
        for action in [OutboxAction::Create, OutboxAction::Update, OutboxAction::Delete] {
            assert_eq!(OutboxAction::parse(action.as_str()).unwrap(), action);
        }
        assert!(OutboxAction::parse("upsert").is_err());
    }

    #[test]
    fn test_create_op_derives_kind_and_id() {
        let room = Room::new("101", "double", 1);
        let id = room.id.clone();
        let op = OutboxOp::create(EntityPayload::Room(room));
        assert_eq!(op.kind, EntityKind::Rooms);
        assert_eq!(op.entity_id, id);
        assert_eq!(op.retry_count, 0);
        assert!(op.payload.is_some());
    }

    #[test]
    fn test_delete_op_has_no_payload() {
        let op = OutboxOp::delete(EntityKind::Clients, "abc");
        assert!(op.payload.is_none());
        assert_eq!(op.action, OutboxAction::Delete);
    }
}
