//! The authorization decision.
//!
//! [`authorize`] is a pure function over an [`AuthContext`]; everything that
//! needs I/O (reading the session, asking GitHub, querying agreements) is
//! done beforehand by the gatekeeper. Checks run in a fixed order and stop at
//! the first failure.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::AuthError;
use crate::models::{MembershipCheck, SessionUser};

/// Agreement status as resolved for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgreementState {
    /// The route does not require the agreement.
    NotRequired,
    /// Accepted, or there is no current agreement.
    Accepted,
    NotAccepted,
    LookupFailed(String),
}

/// Inputs to the authorization decision.
#[derive(Debug, Clone)]
pub struct AuthContext<'a> {
    pub user: Option<&'a SessionUser>,
    pub organization: Option<&'a str>,
    pub membership: Option<&'a MembershipCheck>,
    pub agreement: AgreementState,
}

/// A signed-in, eligible staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedActor {
    /// Stable GitHub account ID.
    pub github_id: i64,
    /// GitHub login, recorded on the rows this actor writes.
    pub login: String,
    pub name: Option<String>,
}

impl AuthenticatedActor {
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }
}

/// Decide whether the request may proceed.
///
/// # Errors
///
/// In order: `Unauthorized` without a session user, `ConfigurationError`
/// without an organization, `Forbidden` unless the membership check is
/// positive and unexpired at `now`, then `AgreementCheckFailed` or
/// `AgreementRequired` when the route needs the agreement.
pub fn authorize(ctx: &AuthContext<'_>, now: DateTime<Utc>) -> Result<AuthenticatedActor, AuthError> {
    let user = ctx.user.ok_or(AuthError::Unauthorized)?;

    if ctx.organization.is_none_or(|org| org.trim().is_empty()) {
        return Err(AuthError::ConfigurationError);
    }

    if !ctx.membership.is_some_and(|check| check.grants_access(now)) {
        return Err(AuthError::Forbidden);
    }

    match &ctx.agreement {
        AgreementState::NotRequired | AgreementState::Accepted => {}
        AgreementState::LookupFailed(reason) => {
            return Err(AuthError::AgreementCheckFailed(reason.clone()));
        }
        AgreementState::NotAccepted => return Err(AuthError::AgreementRequired),
    }

    Ok(AuthenticatedActor {
        github_id: user.github_id,
        login: user.login.clone(),
        name: user.name.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn user() -> SessionUser {
        SessionUser {
            github_id: 4242,
            login: "volunteer".to_string(),
            name: Some("Vera Volunteer".to_string()),
            avatar_url: None,
        }
    }

    fn fresh_membership() -> MembershipCheck {
        MembershipCheck::new(true, now() - Duration::minutes(5), Duration::minutes(60))
    }

    #[test]
    fn test_all_checks_pass() {
        let user = user();
        let membership = fresh_membership();
        let ctx = AuthContext {
            user: Some(&user),
            organization: Some("foodbank-org"),
            membership: Some(&membership),
            agreement: AgreementState::Accepted,
        };
        let actor = authorize(&ctx, now()).unwrap();
        assert_eq!(
            actor,
            AuthenticatedActor {
                github_id: 4242,
                login: "volunteer".to_string(),
                name: Some("Vera Volunteer".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_user_wins_over_everything() {
        let ctx = AuthContext {
            user: None,
            organization: None,
            membership: None,
            agreement: AgreementState::LookupFailed("db down".to_string()),
        };
        assert_eq!(authorize(&ctx, now()), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_unconfigured_org_before_membership() {
        let user = user();
        for organization in [None, Some(""), Some("  ")] {
            let ctx = AuthContext {
                user: Some(&user),
                organization,
                membership: None,
                agreement: AgreementState::NotRequired,
            };
            assert_eq!(authorize(&ctx, now()), Err(AuthError::ConfigurationError));
        }
    }

    #[test]
    fn test_membership_missing_negative_or_expired() {
        let user = user();
        let negative = MembershipCheck::new(false, now(), Duration::minutes(60));
        let expired = MembershipCheck::new(true, now() - Duration::minutes(60), Duration::minutes(60));
        for membership in [None, Some(&negative), Some(&expired)] {
            let ctx = AuthContext {
                user: Some(&user),
                organization: Some("foodbank-org"),
                membership,
                agreement: AgreementState::NotRequired,
            };
            assert_eq!(authorize(&ctx, now()), Err(AuthError::Forbidden));
        }
    }

    #[test]
    fn test_agreement_outcomes() {
        fn ctx<'a>(
            user: &'a SessionUser,
            membership: &'a MembershipCheck,
            agreement: AgreementState,
        ) -> AuthContext<'a> {
            AuthContext {
                user: Some(user),
                organization: Some("foodbank-org"),
                membership: Some(membership),
                agreement,
            }
        }

        let user = user();
        let membership = fresh_membership();

        assert_eq!(
            authorize(&ctx(&user, &membership, AgreementState::NotAccepted), now()),
            Err(AuthError::AgreementRequired)
        );
        assert_eq!(
            authorize(
                &ctx(&user, &membership, AgreementState::LookupFailed("timeout".to_string())),
                now()
            ),
            Err(AuthError::AgreementCheckFailed("timeout".to_string()))
        );
        assert!(authorize(&ctx(&user, &membership, AgreementState::NotRequired), now()).is_ok());
    }

    #[test]
    fn test_codes() {
        assert_eq!(AuthError::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(AuthError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(AuthError::ConfigurationError.code(), "CONFIGURATION_ERROR");
        assert_eq!(AuthError::AgreementRequired.code(), "AGREEMENT_REQUIRED");
        assert_eq!(
            AuthError::AgreementCheckFailed(String::new()).code(),
            "AGREEMENT_CHECK_FAILED"
        );
    }
}
