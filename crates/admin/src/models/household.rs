//! Household models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{
    HouseholdId, Locale, MemberSex, PhoneNumber, PostalCode, VerificationQuestionId,
};

use super::comment::CommentView;
use super::parcel::ParcelView;

/// A registered household.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: PhoneNumber,
    pub postal_code: PostalCode,
    pub locale: Locale,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub anonymized_by: Option<String>,
}

impl Household {
    /// Anonymized households are read-only.
    #[must_use]
    pub const fn is_anonymized(&self) -> bool {
        self.anonymized_at.is_some()
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One person in a household. Only age and sex are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub age: u8,
    pub sex: MemberSex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub species: String,
    pub count: u32,
}

/// Row in the household list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdSummary {
    pub id: HouseholdId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub next_pickup: Option<DateTime<Utc>>,
}

/// Everything shown on the household page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdDetail {
    pub household: Household,
    pub members: Vec<HouseholdMember>,
    pub pets: Vec<Pet>,
    pub dietary_restrictions: Vec<String>,
    pub additional_needs: Vec<String>,
    pub parcels: Vec<ParcelView>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInput {
    pub age: i32,
    pub sex: MemberSex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PetInput {
    pub species: String,
    pub count: i32,
}

/// Request body for enrolling or editing a household.
#[derive(Debug, Clone, Deserialize)]
pub struct HouseholdInput {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub postal_code: String,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub members: Vec<MemberInput>,
    #[serde(default)]
    pub pets: Vec<PetInput>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub additional_needs: Vec<String>,
    /// Verification questions the staff member has confirmed. Only read
    /// at enrollment.
    #[serde(default)]
    pub verified_question_ids: Vec<VerificationQuestionId>,
}

/// Validated household fields, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdData {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: PhoneNumber,
    pub postal_code: PostalCode,
    pub locale: Locale,
    pub members: Vec<HouseholdMember>,
    pub pets: Vec<Pet>,
    pub dietary_restrictions: Vec<String>,
    pub additional_needs: Vec<String>,
}
