//! Room model

use serde::{Deserialize, Serialize};

use super::payload::new_entity_id;

/// A bookable room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Door number shown to staff ("101", "12B")
    pub number: String,
    /// Category name ("single", "double", "suite")
    pub category: String,
    /// Floor the room is on
    pub floor: i32,
    /// Blocked for maintenance; still stored and synced, not bookable
    pub out_of_service: bool,
}

impl Room {
    /// Create a new room with a fresh id
    #[must_use]
    pub fn new(number: impl Into<String>, category: impl Into<String>, floor: i32) -> Self {
        Self {
            id: new_entity_id(),
            number: number.into(),
            category: category.into(),
            floor,
            out_of_service: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_new() {
        let room = Room::new("101", "double", 1);
        assert_eq!(room.number, "101");
        assert_eq!(room.category, "double");
        assert!(!room.out_of_service);
        assert!(!room.id.is_empty());
    }

    #[test]
    fn test_room_ids_unique() {
        assert_ne!(Room::new("101", "double", 1).id, Room::new("101", "double", 1).id);
    }
}
