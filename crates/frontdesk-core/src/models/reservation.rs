//! Reservation model
//!
//! The reservation carries the one invariant generic CRUD sync cannot
//! protect: no two active reservations for the same room may have
//! overlapping `[check_in, check_out)` intervals. The overlap test itself
//! lives in [`crate::conflict`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::payload::new_entity_id;

/// Lifecycle status of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Tentative hold, not yet confirmed by the guest
    Option,
    /// Confirmed booking
    Confirmed,
    /// Guest is in the room
    CheckedIn,
    /// Stay completed
    CheckedOut,
    /// Cancelled; no longer blocks the room
    Cancelled,
}

impl ReservationStatus {
    /// Cancelled reservations never participate in the overlap invariant
    #[must_use]
    pub const fn blocks_room(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// A payment recorded against a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// References a `PaymentMethod` id
    pub method_id: String,
    /// Amount in minor units
    pub amount_cents: i64,
    /// Date the payment was taken
    pub received_on: NaiveDate,
}

impl Payment {
    /// Record a new payment with a fresh id
    #[must_use]
    pub fn new(method_id: impl Into<String>, amount_cents: i64, received_on: NaiveDate) -> Self {
        Self {
            id: new_entity_id(),
            method_id: method_id.into(),
            amount_cents,
            received_on,
        }
    }
}

/// A catalog service charged to a reservation (minibar, laundry, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCharge {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// References a `ServiceItem` id
    pub service_id: String,
    /// Units charged
    pub quantity: u32,
    /// Unit price in minor units at the time of charging
    pub unit_price_cents: i64,
}

impl ServiceCharge {
    /// Record a new service charge with a fresh id
    #[must_use]
    pub fn new(service_id: impl Into<String>, quantity: u32, unit_price_cents: i64) -> Self {
        Self {
            id: new_entity_id(),
            service_id: service_id.into(),
            quantity,
            unit_price_cents,
        }
    }

    /// Line total in minor units
    #[must_use]
    pub const fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// A stay in a room over a half-open date interval `[check_in, check_out)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Room being occupied
    pub room_id: String,
    /// Client the stay is billed to
    pub client_id: String,
    /// Arrival date (inclusive)
    pub check_in: NaiveDate,
    /// Departure date (exclusive; same-day turnover with the next arrival is allowed)
    pub check_out: NaiveDate,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Payments taken so far
    pub payments: Vec<Payment>,
    /// Services charged to the stay
    pub services: Vec<ServiceCharge>,
    /// Deposit requested up front, in minor units
    pub deposit_cents: i64,
    /// Nightly rate in minor units
    pub base_rate_cents: i64,
    /// Quoted total in minor units (pricing is computed outside this crate)
    pub total_cents: i64,
    /// Free-form front desk notes
    pub notes: String,
}

impl Reservation {
    /// Create a new confirmed reservation with a fresh id
    #[must_use]
    pub fn new(
        room_id: impl Into<String>,
        client_id: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Self {
        Self {
            id: new_entity_id(),
            room_id: room_id.into(),
            client_id: client_id.into(),
            check_in,
            check_out,
            status: ReservationStatus::Confirmed,
            payments: Vec::new(),
            services: Vec::new(),
            deposit_cents: 0,
            base_rate_cents: 0,
            total_cents: 0,
            notes: String::new(),
        }
    }

    /// Number of nights in the stay (zero when the interval is empty or inverted)
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(0)
    }

    /// Sum of recorded payments in minor units
    #[must_use]
    pub fn paid_cents(&self) -> i64 {
        self.payments.iter().map(|p| p.amount_cents).sum()
    }

    /// Whether this reservation blocks its room for the overlap invariant
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.blocks_room()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_reservation_defaults() {
        let res = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        assert_eq!(res.status, ReservationStatus::Confirmed);
        assert!(res.is_active());
        assert_eq!(res.nights(), 4);
        assert!(res.payments.is_empty());
    }

    #[test]
    fn test_cancelled_does_not_block_room() {
        let mut res = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        res.status = ReservationStatus::Cancelled;
        assert!(!res.is_active());
    }

    #[test]
    fn test_paid_cents_sums_payments() {
        let mut res = Reservation::new("room-1", "client-1", date(2024, 6, 1), date(2024, 6, 5));
        res.payments.push(Payment::new("cash", 50_00, date(2024, 6, 1)));
        res.payments.push(Payment::new("card", 25_00, date(2024, 6, 2)));
        assert_eq!(res.paid_cents(), 75_00);
    }

    #[test]
    fn test_service_charge_total() {
        let charge = ServiceCharge::new("laundry", 3, 4_50);
        assert_eq!(charge.total_cents(), 13_50);
    }

    #[test]
    fn test_inverted_interval_has_zero_nights() {
        let res = Reservation::new("room-1", "client-1", date(2024, 6, 5), date(2024, 6, 1));
        assert_eq!(res.nights(), 0);
    }
}
