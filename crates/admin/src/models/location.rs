//! Pickup locations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{Email, PhoneNumber, PickupLocationId, PostalCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupLocation {
    pub id: PickupLocationId,
    pub name: String,
    pub street_address: String,
    pub postal_code: PostalCode,
    pub contact_name: Option<String>,
    pub contact_email: Option<Email>,
    pub contact_phone: Option<PhoneNumber>,
    /// Cap on non-cancelled parcels per local date. `None` is unlimited.
    pub parcels_max_per_day: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating or updating a pickup location.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub name: String,
    pub street_address: String,
    pub postal_code: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub parcels_max_per_day: Option<i32>,
}
