//! SMS provider errors.

use thiserror::Error;

/// Errors that can occur when talking to the SMS provider.
#[derive(Debug, Error)]
pub enum SmsError {
    /// Network failure or timeout.
    #[error("SMS request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider asked us to slow down.
    #[error("SMS provider rate limit, retry after {0} seconds")]
    RateLimited(u64),

    /// Provider-side failure (5xx).
    #[error("SMS provider error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Provider refused the message (4xx other than 401/429).
    #[error("SMS rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Credentials were refused.
    #[error("SMS provider rejected the credentials")]
    Unauthorized,

    /// Response could not be parsed.
    #[error("SMS response error: {0}")]
    Parse(String),

    /// SMS is not configured on this server.
    #[error("SMS is not configured")]
    NotConfigured,
}

impl SmsError {
    /// Whether sending again later can succeed.
    ///
    /// A parse failure happens after the provider accepted the request, so
    /// it is not retried to avoid sending the message twice.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited(_) | Self::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SmsError::RateLimited(30).is_transient());
        assert!(
            SmsError::Server {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !SmsError::Rejected {
                status: 400,
                message: "invalid to".to_string()
            }
            .is_transient()
        );
        assert!(!SmsError::Unauthorized.is_transient());
        assert!(!SmsError::Parse("bad json".to_string()).is_transient());
    }
}
