//! Integration tests for the GitHub client against a mock server.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use foodbank_admin::config::GithubConfig;
use foodbank_admin::github::{GithubClient, GithubError, GithubProfile};

const CALLBACK: &str = "https://parcels.example.org/auth/github/callback";

fn client(server: &MockServer) -> GithubClient {
    let config = GithubConfig {
        oauth_base: server.uri(),
        api_base: server.uri(),
        ..GithubConfig::new(
            "Iv1.test".to_string(),
            SecretString::from("test-client-secret"),
            Some("city-foodbank".to_string()),
        )
    };
    GithubClient::new(&config).unwrap()
}

fn token() -> SecretString {
    SecretString::from("gho_member_token")
}

// =============================================================================
// OAuth
// =============================================================================

#[tokio::test]
async fn test_exchange_code_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("client_id=Iv1.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_new",
            "token_type": "bearer",
            "scope": "read:org,read:user",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server).exchange_code("abc", CALLBACK).await.unwrap();
    assert_eq!(token.expose_secret(), "gho_new");
}

#[tokio::test]
async fn test_refused_code_is_oauth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired.",
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .exchange_code("stale", CALLBACK)
        .await
        .unwrap_err();
    assert!(matches!(err, GithubError::OAuth(ref msg) if msg.starts_with("bad_verification_code")));
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_current_user_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer gho_member_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1001,
            "login": "parcel-packer",
            "name": "Pat Packer",
            "avatar_url": "https://avatars.example.org/u/1001",
            "public_repos": 3,
        })))
        .mount(&server)
        .await;

    let profile = client(&server).current_user(&token()).await.unwrap();
    assert_eq!(
        profile,
        GithubProfile {
            id: 1001,
            login: "parcel-packer".to_string(),
            name: Some("Pat Packer".to_string()),
            avatar_url: Some("https://avatars.example.org/u/1001".to_string()),
        }
    );
}

#[tokio::test]
async fn test_revoked_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials",
        })))
        .mount(&server)
        .await;

    let err = client(&server).current_user(&token()).await.unwrap_err();
    assert!(matches!(err, GithubError::Unauthorized));
}

#[tokio::test]
async fn test_exhausted_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/someone"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("Retry-After", "120"),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .user_profile("someone", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GithubError::RateLimited(120)));
}

// =============================================================================
// Organization membership
// =============================================================================

async fn membership_response(template: ResponseTemplate) -> Result<bool, GithubError> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/memberships/orgs/city-foodbank"))
        .respond_with(template)
        .mount(&server)
        .await;

    client(&server)
        .is_org_member(&token(), "city-foodbank")
        .await
}

#[tokio::test]
async fn test_active_membership_is_member() {
    let result = membership_response(
        ResponseTemplate::new(200).set_body_json(json!({"state": "active", "role": "member"})),
    )
    .await;
    assert!(result.unwrap());
}

#[tokio::test]
async fn test_pending_invitation_is_not_member() {
    let result = membership_response(
        ResponseTemplate::new(200).set_body_json(json!({"state": "pending", "role": "member"})),
    )
    .await;
    assert!(!result.unwrap());
}

#[tokio::test]
async fn test_missing_membership_is_not_member() {
    let result = membership_response(ResponseTemplate::new(404)).await;
    assert!(!result.unwrap());

    let result = membership_response(
        ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "4999"),
    )
    .await;
    assert!(!result.unwrap());
}

#[tokio::test]
async fn test_rate_limited_membership_check_is_an_error() {
    let result = membership_response(
        ResponseTemplate::new(403)
            .insert_header("x-ratelimit-remaining", "0")
            .insert_header("Retry-After", "120"),
    )
    .await;
    assert!(matches!(result, Err(GithubError::RateLimited(120))));

    let result =
        membership_response(ResponseTemplate::new(429).insert_header("Retry-After", "30")).await;
    assert!(matches!(result, Err(GithubError::RateLimited(30))));
}

#[tokio::test]
async fn test_server_error_propagates() {
    let result = membership_response(ResponseTemplate::new(502).set_body_string("bad gateway")).await;
    assert!(matches!(
        result,
        Err(GithubError::Api { status: 502, .. })
    ));
}
