//! Usage agreement that staff must accept before working with household data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::AgreementId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub version: i32,
    pub content: String,
    pub effective_from: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The current agreement and whether the signed-in user has accepted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementStatus {
    pub agreement: Option<Agreement>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl AgreementStatus {
    /// Nothing to accept counts as accepted.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        self.agreement.is_none() || self.accepted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_current_agreement_is_satisfied() {
        let status = AgreementStatus {
            agreement: None,
            accepted_at: None,
        };
        assert!(status.is_satisfied());
    }

    #[test]
    fn test_unaccepted_agreement_is_not_satisfied() {
        let now = Utc::now();
        let agreement = Agreement {
            id: AgreementId::generate(),
            version: 2,
            content: "Handle household data with care.".to_string(),
            effective_from: now,
            created_at: now,
        };
        let mut status = AgreementStatus {
            agreement: Some(agreement),
            accepted_at: None,
        };
        assert!(!status.is_satisfied());
        status.accepted_at = Some(now);
        assert!(status.is_satisfied());
    }
}
