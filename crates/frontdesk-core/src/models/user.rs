//! User model

use serde::{Deserialize, Serialize};

use super::payload::new_entity_id;

/// A front desk user account (authentication itself lives outside this crate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Login name
    pub username: String,
    /// Name shown in the UI
    pub display_name: String,
    /// Role label consumed by the permission layer ("reception", "manager")
    pub role: String,
}

impl User {
    /// Create a new user with a fresh id
    #[must_use]
    pub fn new(username: impl Into<String>, display_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            username: username.into(),
            display_name: display_name.into(),
            role: role.into(),
        }
    }
}
