//! Entity kind registry and the typed payload union.
//!
//! Every record in the local replica and every outbox entry carries one of
//! the seven entity kinds. `EntityPayload` is the tagged union over them, so
//! push-phase translation and storage dispatch are exhaustive matches rather
//! than a runtime switch over table-name strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Client, PaymentMethod, Reservation, Room, ServiceItem, Tax, User};
use crate::error::{Error, Result};

/// Generate a fresh entity id (UUID v7, time-sortable)
#[must_use]
pub fn new_entity_id() -> String {
    Uuid::now_v7().to_string()
}

/// The entity tables known to the replica, in pull order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Rooms,
    Clients,
    Reservations,
    Taxes,
    PaymentMethods,
    Services,
    Users,
}

impl EntityKind {
    /// All kinds, in the order the pull phase visits them
    pub const ALL: [Self; 7] = [
        Self::Rooms,
        Self::Clients,
        Self::Reservations,
        Self::Taxes,
        Self::PaymentMethods,
        Self::Services,
        Self::Users,
    ];

    /// SQL table name for this kind in the local replica
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Rooms => "rooms",
            Self::Clients => "clients",
            Self::Reservations => "reservations",
            Self::Taxes => "taxes",
            Self::PaymentMethods => "payment_methods",
            Self::Services => "services",
            Self::Users => "users",
        }
    }

    /// Parse a table name back into a kind (outbox rows store the name)
    pub fn from_table_name(name: &str) -> Result<Self> {
        match name {
            "rooms" => Ok(Self::Rooms),
            "clients" => Ok(Self::Clients),
            "reservations" => Ok(Self::Reservations),
            "taxes" => Ok(Self::Taxes),
            "payment_methods" => Ok(Self::PaymentMethods),
            "services" => Ok(Self::Services),
            "users" => Ok(Self::Users),
            other => Err(Error::InvalidInput(format!("unknown entity table: {other}"))),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Tagged union over every entity the replica stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum EntityPayload {
    Room(Room),
    Client(Client),
    Reservation(Reservation),
    Tax(Tax),
    PaymentMethod(PaymentMethod),
    Service(ServiceItem),
    User(User),
}

impl EntityPayload {
    /// The kind (and therefore local table) this payload belongs to
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Room(_) => EntityKind::Rooms,
            Self::Client(_) => EntityKind::Clients,
            Self::Reservation(_) => EntityKind::Reservations,
            Self::Tax(_) => EntityKind::Taxes,
            Self::PaymentMethod(_) => EntityKind::PaymentMethods,
            Self::Service(_) => EntityKind::Services,
            Self::User(_) => EntityKind::Users,
        }
    }

    /// The entity's id
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Room(r) => &r.id,
            Self::Client(c) => &c.id,
            Self::Reservation(r) => &r.id,
            Self::Tax(t) => &t.id,
            Self::PaymentMethod(m) => &m.id,
            Self::Service(s) => &s.id,
            Self::User(u) => &u.id,
        }
    }

    /// Serialize just the inner record (the kind is stored in the table itself)
    pub fn record_json(&self) -> Result<String> {
        let value = match self {
            Self::Room(r) => serde_json::to_string(r),
            Self::Client(c) => serde_json::to_string(c),
            Self::Reservation(r) => serde_json::to_string(r),
            Self::Tax(t) => serde_json::to_string(t),
            Self::PaymentMethod(m) => serde_json::to_string(m),
            Self::Service(s) => serde_json::to_string(s),
            Self::User(u) => serde_json::to_string(u),
        }?;
        Ok(value)
    }

    /// Deserialize a stored record of a known kind
    pub fn from_record_json(kind: EntityKind, json: &str) -> Result<Self> {
        let payload = match kind {
            EntityKind::Rooms => Self::Room(serde_json::from_str(json)?),
            EntityKind::Clients => Self::Client(serde_json::from_str(json)?),
            EntityKind::Reservations => Self::Reservation(serde_json::from_str(json)?),
            EntityKind::Taxes => Self::Tax(serde_json::from_str(json)?),
            EntityKind::PaymentMethods => Self::PaymentMethod(serde_json::from_str(json)?),
            EntityKind::Services => Self::Service(serde_json::from_str(json)?),
            EntityKind::Users => Self::User(serde_json::from_str(json)?),
        };
        Ok(payload)
    }

    /// Consume into the inner reservation, if this is one
    #[must_use]
    pub fn into_reservation(self) -> Option<Reservation> {
        match self {
            Self::Reservation(r) => Some(r),
            _ => None,
        }
    }

    /// Consume into the inner client, if this is one
    #[must_use]
    pub fn into_client(self) -> Option<Client> {
        match self {
            Self::Client(c) => Some(c),
            _ => None,
        }
    }

    /// Consume into the inner room, if this is one
    #[must_use]
    pub fn into_room(self) -> Option<Room> {
        match self {
            Self::Room(r) => Some(r),
            _ => None,
        }
    }
}

/// Sync metadata attached to every stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// False until the remote store has acknowledged the current version
    pub synced: bool,
    /// Last local write timestamp (Unix ms)
    pub last_modified: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_name_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_table_name(kind.table_name()).unwrap(), kind);
        }
    }

    #[test]
    fn test_from_table_name_rejects_unknown() {
        assert!(EntityKind::from_table_name("invoices").is_err());
    }

    #[test]
    fn test_record_json_round_trip() {
        let payload = EntityPayload::Room(Room::new("101", "double", 1));
        let json = payload.record_json().unwrap();
        let back = EntityPayload::from_record_json(EntityKind::Rooms, &json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_kind_matches_variant() {
        let payload = EntityPayload::Client(Client::new("Ada"));
        assert_eq!(payload.kind(), EntityKind::Clients);
        assert_eq!(payload.kind().table_name(), "clients");
    }
}
