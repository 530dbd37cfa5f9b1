//! Enumerations shared between the database, the API and SMS rendering.

use serde::{Deserialize, Serialize};

/// Preferred language of a household, used for SMS texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "locale", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    Sv,
    En,
}

/// Sex of a household member, recorded for aggregate statistics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "member_sex", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MemberSex {
    Male,
    Female,
    Other,
}

/// Why an SMS was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sms_intent", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SmsIntent {
    /// Reminder ahead of a scheduled pickup.
    PickupReminder,
    /// Welcome message after enrollment.
    Enrolment,
    /// A previously announced parcel was cancelled.
    ParcelCancelled,
    /// A previously announced parcel was rescheduled.
    ParcelUpdated,
}

impl std::fmt::Display for SmsIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PickupReminder => write!(f, "pickup_reminder"),
            Self::Enrolment => write!(f, "enrolment"),
            Self::ParcelCancelled => write!(f, "parcel_cancelled"),
            Self::ParcelUpdated => write!(f, "parcel_updated"),
        }
    }
}

/// Delivery state of a queued SMS.
///
/// ```text
/// queued -> sending -> sent
///              |-> retrying -> sending ...
///              |-> failed
/// queued | retrying -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sms_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Queued,
    Sending,
    Sent,
    Retrying,
    Failed,
    Cancelled,
}

impl SmsStatus {
    /// Whether no further delivery attempts will be made.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SmsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Sending => write!(f, "sending"),
            Self::Sent => write!(f, "sent"),
            Self::Retrying => write!(f, "retrying"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SmsStatus::Sent.is_terminal());
        assert!(SmsStatus::Failed.is_terminal());
        assert!(SmsStatus::Cancelled.is_terminal());
        assert!(!SmsStatus::Queued.is_terminal());
        assert!(!SmsStatus::Retrying.is_terminal());
        assert!(!SmsStatus::Sending.is_terminal());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&SmsIntent::PickupReminder).expect("serialize");
        assert_eq!(json, format!("\"{}\"", SmsIntent::PickupReminder));
        let locale: Locale = serde_json::from_str("\"en\"").expect("deserialize");
        assert_eq!(locale, Locale::En);
    }
}
