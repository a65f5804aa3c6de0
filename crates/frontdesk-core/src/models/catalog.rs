//! Billing catalog models: taxes, payment methods, service items

use serde::{Deserialize, Serialize};

use super::payload::new_entity_id;

/// A tax applied by the billing layer (rates are consumed, not computed, here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Display name ("VAT", "City tax")
    pub name: String,
    /// Rate in permille (190 = 19.0%) to keep the record integer-only
    pub rate_permille: u32,
}

impl Tax {
    /// Create a new tax with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, rate_permille: u32) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            rate_permille,
        }
    }
}

/// An accepted payment method ("Cash", "Visa", "Bank transfer")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Display name
    pub name: String,
    /// Disabled methods stay synced but are hidden from new payments
    pub enabled: bool,
}

impl PaymentMethod {
    /// Create a new enabled payment method with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            enabled: true,
        }
    }
}

/// A sellable catalog service (minibar item, laundry, parking, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    /// Unique identifier (UUID v7 string)
    pub id: String,
    /// Display name
    pub name: String,
    /// Current unit price in minor units
    pub price_cents: i64,
    /// Disabled items stay synced but are hidden from new charges
    pub enabled: bool,
}

impl ServiceItem {
    /// Create a new enabled service item with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            price_cents,
            enabled: true,
        }
    }
}
