//! Room/date collision detection
//!
//! Two contracts: a pure overlap test over an in-memory reservation set, and
//! a heavier variant that re-queries the authoritative remote store so the
//! decision is never based on a stale replica. A detected collision is a
//! normal value for the caller to act on, never an error.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Reservation, Room};
use crate::remote::{adapter, RemoteStore};

/// A candidate booking to test against existing reservations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionCandidate {
    /// Room being requested
    pub room_id: String,
    /// Arrival date (inclusive)
    pub check_in: NaiveDate,
    /// Departure date (exclusive)
    pub check_out: NaiveDate,
    /// Reservation to ignore, when re-checking an edit of itself
    pub exclude_id: Option<String>,
}

impl CollisionCandidate {
    /// Candidate for a brand-new booking
    #[must_use]
    pub fn new(room_id: impl Into<String>, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            room_id: room_id.into(),
            check_in,
            check_out,
            exclude_id: None,
        }
    }

    /// Candidate for an edit of an existing reservation
    #[must_use]
    pub fn for_edit(reservation: &Reservation) -> Self {
        Self {
            room_id: reservation.room_id.clone(),
            check_in: reservation.check_in,
            check_out: reservation.check_out,
            exclude_id: Some(reservation.id.clone()),
        }
    }
}

/// Outcome of the remote-authoritative collision check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionReport {
    /// The overlapping reservation, when one exists
    pub existing: Option<Reservation>,
    /// Full room catalog as candidate alternatives; the caller filters by
    /// availability and category
    pub alternatives: Vec<Room>,
}

impl CollisionReport {
    /// Whether the candidate collides with an existing reservation
    #[must_use]
    pub const fn has_collision(&self) -> bool {
        self.existing.is_some()
    }
}

/// Open-interval overlap test over a reservation set.
///
/// True iff some reservation shares the candidate's room, is not cancelled,
/// is not the excluded id, and satisfies
/// `candidate.check_in < other.check_out && other.check_in < candidate.check_out`.
/// Touching boundaries are not a collision: a checkout on the day of the next
/// check-in is permitted (same-day turnover).
#[must_use]
pub fn has_collision(candidate: &CollisionCandidate, reservations: &[Reservation]) -> bool {
    find_collision(candidate, reservations).is_some()
}

/// Like [`has_collision`], returning the first offending reservation
#[must_use]
pub fn find_collision<'a>(
    candidate: &CollisionCandidate,
    reservations: &'a [Reservation],
) -> Option<&'a Reservation> {
    reservations.iter().find(|other| {
        other.room_id == candidate.room_id
            && other.is_active()
            && candidate.exclude_id.as_deref() != Some(other.id.as_str())
            && candidate.check_in < other.check_out
            && other.check_in < candidate.check_out
    })
}

/// Re-check a candidate against the authoritative remote store and propose
/// alternative rooms.
///
/// Queries the remote directly (bypassing the local replica) for overlapping
/// reservations on the candidate's room, and returns the full room catalog
/// for caller-side filtering. A failed remote query is returned as an error;
/// this function never assumes "no collision" on failure.
pub async fn resolve_remote_collision<R: RemoteStore>(
    remote: &R,
    candidate: &CollisionCandidate,
) -> Result<CollisionReport> {
    let rows = remote
        .reservations_overlapping(&candidate.room_id, candidate.check_in, candidate.check_out)
        .await?;

    let mut existing = None;
    for row in &rows {
        let reservation = adapter::from_remote(crate::models::EntityKind::Reservations, row)?
            .into_reservation()
            .ok_or_else(|| crate::Error::Mapping("overlap query returned a non-reservation row".to_string()))?;
        if reservation.is_active()
            && candidate.exclude_id.as_deref() != Some(reservation.id.as_str())
        {
            existing = Some(reservation);
            break;
        }
    }

    let mut alternatives = Vec::new();
    for row in remote.select_all(crate::models::EntityKind::Rooms).await? {
        if let Some(room) = adapter::from_remote(crate::models::EntityKind::Rooms, &row)?.into_room() {
            alternatives.push(room);
        }
    }

    Ok(CollisionReport { existing, alternatives })
}
