//! Authorization for every server action.
//!
//! Handlers call [`Gatekeeper::authorize`] explicitly at the top and branch
//! on the result. The gatekeeper gathers what the decision needs (session
//! user, membership check, agreement status), refreshing the membership
//! check against GitHub when it has expired, then hands off to the pure
//! [`authorize`] function.

mod error;
mod gate;

pub use error::AuthError;
pub use gate::{AgreementState, AuthContext, AuthenticatedActor, authorize};

use chrono::{DateTime, Duration, Utc};
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use crate::db::AgreementRepository;
use crate::error::set_sentry_user;
use crate::github::GithubError;
use crate::middleware::auth::{current_user, github_token};
use crate::models::{AgreementStatus, MembershipCheck, session_keys};
use crate::state::AppState;

/// What a route requires beyond a signed-in member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Organization membership only.
    Membership,
    /// Membership and acceptance of the current usage agreement.
    Agreement,
}

/// What to do with the session's membership check after a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipRefresh {
    /// GitHub answered; store the new check in the session.
    Store(MembershipCheck),
    /// No answer; keep whatever the session had.
    Keep(Option<MembershipCheck>),
}

impl MembershipRefresh {
    /// The check to authorize with.
    #[must_use]
    pub const fn check(self) -> Option<MembershipCheck> {
        match self {
            Self::Store(check) => Some(check),
            Self::Keep(cached) => cached,
        }
    }
}

/// Fold a membership lookup into the cached check.
///
/// `answer` is `None` when no lookup could be made (no token in the
/// session). A failed lookup never replaces the cached check, so a stale
/// check stays stale and is refused.
#[must_use]
pub fn refresh_membership(
    cached: Option<MembershipCheck>,
    answer: Option<&Result<bool, GithubError>>,
    now: DateTime<Utc>,
    recheck_after: Duration,
) -> MembershipRefresh {
    match answer {
        Some(Ok(is_member)) => {
            MembershipRefresh::Store(MembershipCheck::new(*is_member, now, recheck_after))
        }
        Some(Err(_)) | None => MembershipRefresh::Keep(cached),
    }
}

/// Prepares the authorization context for a request.
pub struct Gatekeeper<'a> {
    state: &'a AppState,
}

impl<'a> Gatekeeper<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Authorize the session for `requirement`.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an [`AuthError`].
    #[instrument(skip_all, fields(requirement = ?requirement))]
    pub async fn authorize(
        &self,
        session: &Session,
        requirement: Requirement,
    ) -> Result<AuthenticatedActor, AuthError> {
        let now = Utc::now();
        let user = current_user(session).await;
        let organization = self.state.config().github.organization.as_deref();

        let membership = match (&user, organization) {
            (Some(_), Some(org)) => self.membership(session, org, now).await,
            _ => None,
        };

        let agreement = match (&user, requirement) {
            (Some(user), Requirement::Agreement)
                if membership.is_some_and(|check| check.grants_access(now)) =>
            {
                self.agreement_state(user.github_id, now).await
            }
            _ => AgreementState::NotRequired,
        };

        let ctx = AuthContext {
            user: user.as_ref(),
            organization,
            membership: membership.as_ref(),
            agreement,
        };

        let result = authorize(&ctx, now);
        match &result {
            Ok(actor) => set_sentry_user(actor.github_id, &actor.login),
            Err(e) => debug!(code = e.code(), "Request not authorized"),
        }
        result
    }

    /// The session's membership check, renewed if it has expired.
    ///
    /// When GitHub cannot be asked the stale check is returned unchanged,
    /// which `authorize` treats as forbidden.
    async fn membership(
        &self,
        session: &Session,
        org: &str,
        now: DateTime<Utc>,
    ) -> Option<MembershipCheck> {
        let cached: Option<MembershipCheck> = session
            .get(session_keys::MEMBERSHIP)
            .await
            .ok()
            .flatten();

        if let Some(check) = cached
            && !check.is_stale(now)
        {
            return Some(check);
        }

        let answer = match github_token(session).await {
            Some(token) => Some(self.state.github().is_org_member(&token, org).await),
            None => {
                debug!("No GitHub token in session, membership not re-checked");
                None
            }
        };
        if let Some(Err(e)) = &answer {
            warn!(error = %e, "Membership re-check failed");
        }

        let refresh = refresh_membership(
            cached,
            answer.as_ref(),
            now,
            self.state.config().github.membership_recheck,
        );
        if let MembershipRefresh::Store(check) = refresh {
            if let Err(e) = session.insert(session_keys::MEMBERSHIP, check).await {
                warn!(error = %e, "Failed to store membership check in session");
            }
            debug!(is_member = check.is_member, "Membership re-checked");
        }
        refresh.check()
    }

    async fn agreement_state(&self, github_id: i64, now: DateTime<Utc>) -> AgreementState {
        match agreement_status(self.state, github_id, now).await {
            Ok(status) if status.is_satisfied() => AgreementState::Accepted,
            Ok(_) => AgreementState::NotAccepted,
            Err(e) => {
                warn!(error = %e, "Agreement lookup failed");
                AgreementState::LookupFailed(e.to_string())
            }
        }
    }
}

/// The current agreement and the user's acceptance of it.
///
/// # Errors
///
/// Returns `RepositoryError` if either lookup fails.
pub async fn agreement_status(
    state: &AppState,
    github_id: i64,
    now: DateTime<Utc>,
) -> Result<AgreementStatus, crate::db::RepositoryError> {
    let repo = AgreementRepository::new(state.pool());
    let Some(agreement) = repo.current(now).await? else {
        return Ok(AgreementStatus {
            agreement: None,
            accepted_at: None,
        });
    };
    let accepted_at = repo.accepted_at(github_id, agreement.id).await?;
    Ok(AgreementStatus {
        agreement: Some(agreement),
        accepted_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::SessionUser;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn stale() -> MembershipCheck {
        MembershipCheck::new(true, at("2026-10-19T07:00:00Z"), Duration::minutes(60))
    }

    fn decide(check: Option<MembershipCheck>, now: DateTime<Utc>) -> Result<AuthenticatedActor, AuthError> {
        let user = SessionUser {
            github_id: 1001,
            login: "parcel-packer".to_string(),
            name: None,
            avatar_url: None,
        };
        let ctx = AuthContext {
            user: Some(&user),
            organization: Some("city-foodbank"),
            membership: check.as_ref(),
            agreement: AgreementState::NotRequired,
        };
        authorize(&ctx, now)
    }

    #[test]
    fn test_stale_check_is_renewed_when_github_answers() {
        let now = at("2026-10-19T09:00:00Z");
        let refresh = refresh_membership(Some(stale()), Some(&Ok(true)), now, Duration::minutes(60));

        let renewed = MembershipCheck::new(true, now, Duration::minutes(60));
        assert_eq!(refresh, MembershipRefresh::Store(renewed));
        assert!(decide(refresh.check(), now).is_ok());
    }

    #[test]
    fn test_left_organization_is_stored_and_forbidden() {
        let now = at("2026-10-19T09:00:00Z");
        let refresh = refresh_membership(Some(stale()), Some(&Ok(false)), now, Duration::minutes(60));

        assert!(matches!(refresh, MembershipRefresh::Store(check) if !check.is_member));
        assert_eq!(decide(refresh.check(), now), Err(AuthError::Forbidden));
    }

    #[test]
    fn test_failed_recheck_keeps_stale_check_and_forbids() {
        let now = at("2026-10-19T09:00:00Z");
        for err in [
            GithubError::RateLimited(120),
            GithubError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            },
        ] {
            let refresh =
                refresh_membership(Some(stale()), Some(&Err(err)), now, Duration::minutes(60));
            assert_eq!(refresh, MembershipRefresh::Keep(Some(stale())));
            assert_eq!(decide(refresh.check(), now), Err(AuthError::Forbidden));
        }
    }

    #[test]
    fn test_missing_token_forbids() {
        let now = at("2026-10-19T09:00:00Z");
        let refresh = refresh_membership(Some(stale()), None, now, Duration::minutes(60));
        assert_eq!(decide(refresh.check(), now), Err(AuthError::Forbidden));

        let refresh = refresh_membership(None, None, now, Duration::minutes(60));
        assert_eq!(refresh, MembershipRefresh::Keep(None));
        assert_eq!(decide(refresh.check(), now), Err(AuthError::Forbidden));
    }
}
