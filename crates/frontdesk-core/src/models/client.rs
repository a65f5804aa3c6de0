//! Client model

use serde::{Deserialize, Serialize};

use super::payload::new_entity_id;

/// A guest or account holder.
///
/// `balance_cents` is a signed ledger amount (positive = the client owes the
/// property). It is mutated only through explicit ledger operations (charge /
/// settle) on the sync engine, never by a generic client save — overwriting it
/// from an arbitrary edit would lose concurrent ledger updates during a sync
/// overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Full name
    pub name: String,
    /// Contact email, if known
    pub email: Option<String>,
    /// Contact phone, if known
    pub phone: Option<String>,
    /// Signed ledger balance in minor units (>0 = debt)
    pub balance_cents: i64,
    /// Company/account-holder clients are invoiced rather than charged
    pub is_account_holder: bool,
}

impl Client {
    /// Create a new client with a fresh id and a zero balance
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            email: None,
            phone: None,
            balance_cents: 0,
            is_account_holder: false,
        }
    }

    /// Whether the client currently owes the property money
    #[must_use]
    pub const fn has_debt(&self) -> bool {
        self.balance_cents > 0
    }
}
