//! GitHub HTTP client.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::GithubError;
use super::types::{GithubProfile, OrgMembership, TokenResponse};
use crate::config::GithubConfig;

/// Scopes needed to read the user and their organization memberships.
const OAUTH_SCOPES: &str = "read:user read:org";

const API_ACCEPT: &str = "application/vnd.github+json";

/// GitHub OAuth + REST client.
#[derive(Clone)]
pub struct GithubClient {
    inner: Arc<GithubClientInner>,
}

struct GithubClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    oauth_base: String,
    api_base: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("client_id", &self.inner.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_base", &self.inner.api_base)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Create a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("foodbank-admin/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(GithubClientInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
                api_base: config.api_base.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// URL that starts the OAuth flow.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::Parse` if the configured OAuth base is not a URL.
    pub fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, GithubError> {
        let mut url = Url::parse(&format!("{}/login/oauth/authorize", self.inner.oauth_base))
            .map_err(|e| GithubError::Parse(format!("invalid OAuth base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.inner.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("state", state)
            .append_pair("allow_signup", "false");
        Ok(url.into())
    }

    /// Exchange an OAuth callback code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::OAuth` if GitHub refuses the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, GithubError> {
        let response = self
            .inner
            .client
            .post(format!("{}/login/oauth/access_token", self.inner.oauth_base))
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.inner.client_id.as_str()),
                ("client_secret", self.inner.client_secret.expose_secret()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        let token: TokenResponse = Self::handle_response(response).await?;
        if let Some(error) = token.error {
            let description = token.error_description.unwrap_or_default();
            warn!(error = %error, "GitHub OAuth code exchange refused");
            return Err(GithubError::OAuth(format!("{error}: {description}")));
        }

        token
            .access_token
            .map(SecretString::from)
            .ok_or_else(|| GithubError::Parse("token response without access_token".to_string()))
    }

    /// The user the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::Unauthorized` if the token is no longer valid.
    #[instrument(skip(self, token))]
    pub async fn current_user(&self, token: &SecretString) -> Result<GithubProfile, GithubError> {
        let response = self
            .inner
            .client
            .get(format!("{}/user", self.inner.api_base))
            .header(ACCEPT, API_ACCEPT)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Whether the token's user is an active member of `org`.
    ///
    /// A missing or pending membership is `false`, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if GitHub cannot be reached or rejects the token.
    #[instrument(skip(self, token), fields(org = %org))]
    pub async fn is_org_member(&self, token: &SecretString, org: &str) -> Result<bool, GithubError> {
        let response = self
            .inner
            .client
            .get(format!("{}/user/memberships/orgs/{org}", self.inner.api_base))
            .header(ACCEPT, API_ACCEPT)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        // A 403 that is not a rate limit means the org restricts third-party
        // access or the user is not a member.
        let status = response.status();
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::FORBIDDEN && !is_rate_limited(status, response.headers()))
        {
            debug!("No organization membership");
            return Ok(false);
        }

        let membership: OrgMembership = Self::handle_response(response).await?;
        debug!(state = %membership.state, "Organization membership");
        Ok(membership.is_active())
    }

    /// Public profile of a user, used to show comment authors.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::Api` with status 404 if the login is unknown.
    #[instrument(skip(self, token))]
    pub async fn user_profile(
        &self,
        login: &str,
        token: Option<&SecretString>,
    ) -> Result<GithubProfile, GithubError> {
        let mut request = self
            .inner
            .client
            .get(format!("{}/users/{login}", self.inner.api_base))
            .header(ACCEPT, API_ACCEPT);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        Self::handle_response(request.send().await?).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GithubError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| GithubError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    async fn parse_error(response: reqwest::Response) -> GithubError {
        let status = response.status().as_u16();

        if is_rate_limited(response.status(), response.headers()) {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return GithubError::RateLimited(retry_after);
        }

        if status == 401 {
            return GithubError::Unauthorized;
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        GithubError::Api { status, message }
    }
}

/// GitHub signals an exhausted quota with 429, or 403 and no requests left.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && headers
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v.as_bytes() == b"0"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> GithubClient {
        GithubClient::new(&GithubConfig::new(
            "Iv1.client".to_string(),
            SecretString::from("client-secret"),
            Some("foodbank-org".to_string()),
        ))
        .unwrap()
    }

    #[test]
    fn test_authorize_url_carries_state_and_scopes() {
        let url = client()
            .authorize_url("abc123", "https://parcels.example.org/auth/github/callback")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("github.com"));
        assert_eq!(parsed.path(), "/login/oauth/authorize");

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "Iv1.client");
        assert_eq!(pairs["state"], "abc123");
        assert_eq!(pairs["scope"], "read:user read:org");
        assert_eq!(
            pairs["redirect_uri"],
            "https://parcels.example.org/auth/github/callback"
        );
    }

    #[test]
    fn test_rate_limit_detection() {
        let mut exhausted = HeaderMap::new();
        exhausted.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let mut left = HeaderMap::new();
        left.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));

        assert!(is_rate_limited(StatusCode::FORBIDDEN, &exhausted));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &left));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &HeaderMap::new()));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug_output = format!("{:?}", client());
        assert!(debug_output.contains("Iv1.client"));
        assert!(!debug_output.contains("client-secret"));
    }
}
