//! GitHub-related errors.

use thiserror::Error;

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GithubError {
    /// HTTP request failed.
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by GitHub.
    #[error("GitHub rate limit hit, retry after {0} seconds")]
    RateLimited(u64),

    /// Token rejected.
    #[error("GitHub rejected the access token")]
    Unauthorized,

    /// OAuth code exchange returned an error.
    #[error("GitHub OAuth error: {0}")]
    OAuth(String),

    /// Failed to parse a response.
    #[error("GitHub response error: {0}")]
    Parse(String),
}
