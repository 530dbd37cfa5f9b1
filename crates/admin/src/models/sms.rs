//! Outgoing SMS records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{HouseholdId, ParcelId, SmsId, SmsIntent, SmsStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsRecord {
    pub id: SmsId,
    pub intent: SmsIntent,
    pub household_id: HouseholdId,
    pub parcel_id: Option<ParcelId>,
    pub to_e164: String,
    pub text: String,
    pub status: SmsStatus,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SmsRecord {
    /// Recipient and text were wiped when the household was anonymized.
    #[must_use]
    pub fn is_scrubbed(&self) -> bool {
        self.text.is_empty()
    }
}
