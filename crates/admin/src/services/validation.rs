//! Request validation.
//!
//! Turns `*Input` request bodies into the validated values repositories
//! accept.

use std::collections::HashSet;

use thiserror::Error;

use foodbank_core::{Email, PhoneNumber, PickupLocationId, PostalCode, VerificationQuestionId};

use crate::models::comment::MAX_COMMENT_LENGTH;
use crate::models::{
    HouseholdData, HouseholdInput, HouseholdMember, LocationInput, Pet, PickupLocation,
    VerificationQuestionInput,
};

const MAX_NAME_LENGTH: usize = 50;
const MAX_LOOKUP_LENGTH: usize = 100;
const MAX_QUESTION_LENGTH: usize = 500;
const MAX_MEMBER_AGE: i32 = 120;
const MAX_PET_COUNT: i32 = 99;

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("{missing} required verification question(s) not confirmed")]
    VerificationIncomplete { missing: usize },
}

impl ValidationError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "VALIDATION_ERROR",
            Self::VerificationIncomplete { .. } => "VERIFICATION_INCOMPLETE",
        }
    }
}

/// Trimmed, non-empty text of at most `max` characters.
fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(field, "is required"));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::invalid(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => required_text(field, text, max).map(Some),
    }
}

/// Trimmed, de-duplicated lookup names.
fn lookup_names(field: &'static str, names: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        let name = required_text(field, trimmed, MAX_LOOKUP_LENGTH)?;
        if seen.insert(name.to_lowercase()) {
            result.push(name);
        }
    }
    Ok(result)
}

/// Validate a household enrollment or edit.
///
/// # Errors
///
/// Returns `ValidationError::Invalid` naming the first offending field.
pub fn validate_household(input: &HouseholdInput) -> Result<HouseholdData, ValidationError> {
    let first_name = required_text("first_name", &input.first_name, MAX_NAME_LENGTH)?;
    let last_name = required_text("last_name", &input.last_name, MAX_NAME_LENGTH)?;
    let phone_number = PhoneNumber::parse(&input.phone_number)
        .map_err(|e| ValidationError::invalid("phone_number", e.to_string()))?;
    let postal_code = PostalCode::parse(&input.postal_code)
        .map_err(|e| ValidationError::invalid("postal_code", e.to_string()))?;

    let members = input
        .members
        .iter()
        .map(|m| {
            if !(0..=MAX_MEMBER_AGE).contains(&m.age) {
                return Err(ValidationError::invalid(
                    "members",
                    format!("age must be between 0 and {MAX_MEMBER_AGE}"),
                ));
            }
            let age = u8::try_from(m.age)
                .map_err(|_| ValidationError::invalid("members", "age out of range"))?;
            Ok(HouseholdMember { age, sex: m.sex })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pets = input
        .pets
        .iter()
        .map(|p| {
            let species = required_text("pets", &p.species, MAX_LOOKUP_LENGTH)?;
            if !(1..=MAX_PET_COUNT).contains(&p.count) {
                return Err(ValidationError::invalid(
                    "pets",
                    format!("count must be between 1 and {MAX_PET_COUNT}"),
                ));
            }
            let count = u32::try_from(p.count)
                .map_err(|_| ValidationError::invalid("pets", "count out of range"))?;
            Ok(Pet { species, count })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HouseholdData {
        first_name,
        last_name,
        phone_number,
        postal_code,
        locale: input.locale,
        members,
        pets,
        dietary_restrictions: lookup_names("dietary_restrictions", &input.dietary_restrictions)?,
        additional_needs: lookup_names("additional_needs", &input.additional_needs)?,
    })
}

/// Every required question must be among the confirmed ones.
///
/// # Errors
///
/// Returns `ValidationError::VerificationIncomplete` with the number of
/// unconfirmed required questions.
pub fn check_verification(
    required: &[VerificationQuestionId],
    confirmed: &[VerificationQuestionId],
) -> Result<(), ValidationError> {
    let confirmed: HashSet<_> = confirmed.iter().collect();
    let missing = required.iter().filter(|id| !confirmed.contains(id)).count();
    if missing > 0 {
        return Err(ValidationError::VerificationIncomplete { missing });
    }
    Ok(())
}

/// Validate a comment body.
///
/// # Errors
///
/// Returns `ValidationError::Invalid` if the text is blank or too long.
pub fn validate_comment(text: &str) -> Result<String, ValidationError> {
    required_text("text", text, MAX_COMMENT_LENGTH)
}

/// Validate a pickup location, producing the record to store.
///
/// # Errors
///
/// Returns `ValidationError::Invalid` naming the first offending field.
pub fn validate_location(
    id: PickupLocationId,
    input: &LocationInput,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<PickupLocation, ValidationError> {
    let contact_email = optional_text("contact_email", input.contact_email.as_deref(), 254)?
        .map(|email| Email::parse(&email))
        .transpose()
        .map_err(|e| ValidationError::invalid("contact_email", e.to_string()))?;
    let contact_phone = optional_text("contact_phone", input.contact_phone.as_deref(), 30)?
        .map(|phone| PhoneNumber::parse(&phone))
        .transpose()
        .map_err(|e| ValidationError::invalid("contact_phone", e.to_string()))?;
    let parcels_max_per_day = input
        .parcels_max_per_day
        .map(|max| {
            u32::try_from(max)
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| ValidationError::invalid("parcels_max_per_day", "must be positive"))
        })
        .transpose()?;

    Ok(PickupLocation {
        id,
        name: required_text("name", &input.name, 100)?,
        street_address: required_text("street_address", &input.street_address, 200)?,
        postal_code: PostalCode::parse(&input.postal_code)
            .map_err(|e| ValidationError::invalid("postal_code", e.to_string()))?,
        contact_name: optional_text("contact_name", input.contact_name.as_deref(), 100)?,
        contact_email,
        contact_phone,
        parcels_max_per_day,
        created_at,
    })
}

/// Validate a verification question.
///
/// # Errors
///
/// Returns `ValidationError::Invalid` naming the first offending field.
pub fn validate_question(
    input: &VerificationQuestionInput,
) -> Result<VerificationQuestionInput, ValidationError> {
    Ok(VerificationQuestionInput {
        question_sv: required_text("question_sv", &input.question_sv, MAX_QUESTION_LENGTH)?,
        question_en: required_text("question_en", &input.question_en, MAX_QUESTION_LENGTH)?,
        help_text_sv: optional_text("help_text_sv", input.help_text_sv.as_deref(), MAX_QUESTION_LENGTH)?,
        help_text_en: optional_text("help_text_en", input.help_text_en.as_deref(), MAX_QUESTION_LENGTH)?,
        is_required: input.is_required,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use foodbank_core::{Locale, MemberSex};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{MemberInput, PetInput};

    fn input() -> HouseholdInput {
        HouseholdInput {
            first_name: "  Anna ".to_string(),
            last_name: "Andersson".to_string(),
            phone_number: "070-123 45 67".to_string(),
            postal_code: "123 45".to_string(),
            locale: Locale::Sv,
            members: vec![
                MemberInput {
                    age: 34,
                    sex: MemberSex::Female,
                },
                MemberInput {
                    age: 4,
                    sex: MemberSex::Male,
                },
            ],
            pets: vec![PetInput {
                species: "dog".to_string(),
                count: 1,
            }],
            dietary_restrictions: vec!["Gluten".to_string(), " gluten ".to_string(), String::new()],
            additional_needs: vec!["Diapers".to_string()],
            verified_question_ids: Vec::new(),
        }
    }

    #[test]
    fn test_valid_household_is_normalized() {
        let data = validate_household(&input()).unwrap();
        assert_eq!(data.first_name, "Anna");
        assert_eq!(data.phone_number.as_str(), "+46701234567");
        assert_eq!(data.postal_code.as_str(), "12345");
        assert_eq!(data.members.len(), 2);
        assert_eq!(data.dietary_restrictions, vec!["Gluten".to_string()]);
    }

    #[test]
    fn test_blank_last_name_rejected() {
        let mut input = input();
        input.last_name = "   ".to_string();
        let err = validate_household(&input).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Invalid {
                field: "last_name",
                message: "is required".to_string()
            }
        );
    }

    #[test]
    fn test_member_age_bounds() {
        let mut input = input();
        input.members[0].age = 121;
        assert!(validate_household(&input).is_err());
        input.members[0].age = 120;
        assert!(validate_household(&input).is_ok());
        input.members[0].age = -1;
        assert!(validate_household(&input).is_err());
    }

    #[test]
    fn test_pet_count_must_be_positive() {
        let mut input = input();
        input.pets[0].count = 0;
        assert!(validate_household(&input).is_err());
    }

    #[test]
    fn test_verification_counts_missing() {
        let a = VerificationQuestionId::generate();
        let b = VerificationQuestionId::generate();
        assert!(check_verification(&[a, b], &[b, a]).is_ok());
        assert!(check_verification(&[], &[]).is_ok());
        let err = check_verification(&[a, b], &[a]).unwrap_err();
        assert_eq!(err, ValidationError::VerificationIncomplete { missing: 1 });
        assert_eq!(err.code(), "VERIFICATION_INCOMPLETE");
    }

    #[test]
    fn test_comment_length() {
        assert!(validate_comment("").is_err());
        assert!(validate_comment(&"x".repeat(2000)).is_ok());
        assert!(validate_comment(&"x".repeat(2001)).is_err());
    }

    #[test]
    fn test_location_capacity_must_be_positive() {
        let input = LocationInput {
            name: "Centrum".to_string(),
            street_address: "Storgatan 1".to_string(),
            postal_code: "11122".to_string(),
            contact_name: None,
            contact_email: Some(String::new()),
            contact_phone: None,
            parcels_max_per_day: Some(0),
        };
        let err = validate_location(PickupLocationId::generate(), &input, chrono::Utc::now());
        assert!(err.is_err());
    }
}
