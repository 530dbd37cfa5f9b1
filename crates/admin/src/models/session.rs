//! Types stored in the session for authentication state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session-stored GitHub identity.
///
/// `github_id` is the stable account identifier; `login` and `name` can be
/// changed by the user on GitHub and are for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub github_id: i64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Cached result of an organization membership lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCheck {
    pub is_member: bool,
    pub checked_at: DateTime<Utc>,
    pub next_check_at: DateTime<Utc>,
}

impl MembershipCheck {
    /// Record a lookup made at `now`, trusted for `ttl`.
    #[must_use]
    pub fn new(is_member: bool, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            is_member,
            checked_at: now,
            next_check_at: now + ttl,
        }
    }

    /// Whether the check has to be repeated before it can be trusted.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.next_check_at <= now
    }

    /// A positive check that has not yet expired.
    #[must_use]
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        self.is_member && !self.is_stale(now)
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// The signed-in GitHub user.
    pub const CURRENT_USER: &str = "current_user";

    /// Latest [`super::MembershipCheck`].
    pub const MEMBERSHIP: &str = "membership_check";

    /// GitHub access token used for membership re-checks.
    pub const GITHUB_TOKEN: &str = "github_token";

    /// CSRF state for the OAuth round trip.
    pub const OAUTH_STATE: &str = "oauth_state";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_membership_check_expires_at_boundary() {
        let now = at("2026-10-19T10:00:00Z");
        let check = MembershipCheck::new(true, now, Duration::minutes(60));
        assert_eq!(check.next_check_at, at("2026-10-19T11:00:00Z"));
        assert!(check.grants_access(at("2026-10-19T10:59:59Z")));
        assert!(!check.grants_access(at("2026-10-19T11:00:00Z")));
        assert!(check.is_stale(at("2026-10-19T11:00:00Z")));
    }

    #[test]
    fn test_negative_check_never_grants() {
        let now = at("2026-10-19T10:00:00Z");
        let check = MembershipCheck::new(false, now, Duration::minutes(60));
        assert!(!check.grants_access(now));
        assert!(!check.is_stale(now));
    }
}
