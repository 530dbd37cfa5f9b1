//! Enrollment verification checklist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{Locale, VerificationQuestionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationQuestion {
    pub id: VerificationQuestionId,
    pub question_sv: String,
    pub question_en: String,
    pub help_text_sv: Option<String>,
    pub help_text_en: Option<String>,
    pub is_required: bool,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationQuestion {
    #[must_use]
    pub fn question(&self, locale: Locale) -> &str {
        match locale {
            Locale::Sv => &self.question_sv,
            Locale::En => &self.question_en,
        }
    }
}

/// Request body for creating or updating a question.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationQuestionInput {
    pub question_sv: String,
    pub question_en: String,
    pub help_text_sv: Option<String>,
    pub help_text_en: Option<String>,
    #[serde(default = "default_required")]
    pub is_required: bool,
}

const fn default_required() -> bool {
    true
}
