//! Data models for Frontdesk

mod catalog;
mod client;
mod outbox;
mod payload;
mod reservation;
mod room;
mod user;

pub use catalog::{PaymentMethod, ServiceItem, Tax};
pub use client::Client;
pub use outbox::{OutboxAction, OutboxOp};
pub use payload::{new_entity_id, EntityKind, EntityPayload, SyncMeta};
pub use reservation::{Payment, Reservation, ReservationStatus, ServiceCharge};
pub use room::Room;
pub use user::User;
