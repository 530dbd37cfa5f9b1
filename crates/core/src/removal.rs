//! Household removal outcomes and error codes.
//!
//! These are the wire-level vocabulary of the removal workflow. The workflow
//! itself lives in the admin crate; the codes are shared so that the API and
//! any client agree on the exact strings.

use serde::{Deserialize, Serialize};

/// What a successful removal did to the household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// The household had no parcel history and was deleted outright.
    HardDeleted,
    /// Identifying fields were scrubbed; statistics were kept.
    Anonymized,
}

/// Machine-readable removal failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalErrorCode {
    NotFound,
    AlreadyAnonymized,
    ConfirmationMismatch,
    HasUpcomingParcels,
    RemovalFailed,
}

impl RemovalErrorCode {
    /// The code as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyAnonymized => "ALREADY_ANONYMIZED",
            Self::ConfirmationMismatch => "CONFIRMATION_MISMATCH",
            Self::HasUpcomingParcels => "HAS_UPCOMING_PARCELS",
            Self::RemovalFailed => "REMOVAL_FAILED",
        }
    }
}

impl std::fmt::Display for RemovalErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_screaming_snake_case() {
        for code in [
            RemovalErrorCode::NotFound,
            RemovalErrorCode::AlreadyAnonymized,
            RemovalErrorCode::ConfirmationMismatch,
            RemovalErrorCode::HasUpcomingParcels,
            RemovalErrorCode::RemovalFailed,
        ] {
            let json = serde_json::to_string(&code).expect("serialize");
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(
            serde_json::to_string(&RemovalOutcome::HardDeleted).expect("serialize"),
            "\"hard_deleted\""
        );
        assert_eq!(
            serde_json::to_string(&RemovalOutcome::Anonymized).expect("serialize"),
            "\"anonymized\""
        );
    }
}
