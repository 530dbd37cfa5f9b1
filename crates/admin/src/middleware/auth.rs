//! Session helpers for the signed-in GitHub user.
//!
//! The decision whether a request may proceed lives in
//! [`crate::services::auth`]; these helpers only read and write the session.

use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;

use crate::models::{MembershipCheck, SessionUser, session_keys};

/// The signed-in user, if any.
///
/// A session that cannot be read counts as signed out.
pub async fn current_user(session: &Session) -> Option<SessionUser> {
    session
        .get::<SessionUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// The user's GitHub access token, kept for membership re-checks.
pub async fn github_token(session: &Session) -> Option<SecretString> {
    session
        .get::<String>(session_keys::GITHUB_TOKEN)
        .await
        .ok()
        .flatten()
        .map(SecretString::from)
}

/// Store a freshly authenticated user.
///
/// The session ID is cycled first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn sign_in(
    session: &Session,
    user: &SessionUser,
    token: &SecretString,
    membership: MembershipCheck,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    session
        .insert(session_keys::GITHUB_TOKEN, token.expose_secret())
        .await?;
    session.insert(session_keys::MEMBERSHIP, membership).await?;
    Ok(())
}

/// Clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be deleted from the store.
pub async fn sign_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
