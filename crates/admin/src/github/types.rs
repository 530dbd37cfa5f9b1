//! GitHub API payloads.

use serde::{Deserialize, Serialize};

/// The subset of a GitHub user the admin uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// `GET /user/memberships/orgs/{org}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgMembership {
    /// `active` or `pending`.
    pub state: String,
}

impl OrgMembership {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// `POST /login/oauth/access_token` response.
///
/// GitHub answers 200 for failed exchanges too, with `error` set.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}
