//! Authorization error types.

use thiserror::Error;

/// Why a request was not allowed to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No signed-in user.
    #[error("sign in with GitHub to continue")]
    Unauthorized,

    /// The server has no organization to check membership against.
    #[error("GitHub organization is not configured")]
    ConfigurationError,

    /// Membership is missing, negative, or expired and could not be renewed.
    #[error("membership in the organization is required")]
    Forbidden,

    /// The current usage agreement has not been accepted.
    #[error("the current usage agreement must be accepted")]
    AgreementRequired,

    /// Agreement acceptance could not be determined.
    #[error("could not check agreement acceptance: {0}")]
    AgreementCheckFailed(String),
}

impl AuthError {
    /// Machine-readable code for the API envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::AgreementRequired => "AGREEMENT_REQUIRED",
            Self::AgreementCheckFailed(_) => "AGREEMENT_CHECK_FAILED",
        }
    }
}
