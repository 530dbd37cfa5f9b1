//! SMS provider HTTP client.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::error::SmsError;
use crate::config::SmsConfig;

/// Account balance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsBalance {
    /// Remaining credit in the provider's smallest unit.
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// SMS provider client.
#[derive(Clone)]
pub struct SmsClient {
    inner: Arc<SmsClientInner>,
}

struct SmsClientInner {
    client: reqwest::Client,
    api_url: String,
    username: String,
    password: SecretString,
    from: String,
    test_mode: bool,
}

impl std::fmt::Debug for SmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsClient")
            .field("api_url", &self.inner.api_url)
            .field("username", &self.inner.username)
            .field("password", &"[REDACTED]")
            .field("test_mode", &self.inner.test_mode)
            .finish_non_exhaustive()
    }
}

impl SmsClient {
    /// Create a new SMS client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("foodbank-admin/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(SmsClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                username: config.username.clone(),
                password: config.password.clone(),
                from: config.from.clone(),
                test_mode: config.test_mode,
            }),
        })
    }

    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.inner.test_mode
    }

    /// Send a message and return the provider's message ID.
    ///
    /// In test mode the message is logged and a local ID is returned.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be reached or refuses the message.
    #[instrument(skip(self, text), fields(to = %to, test_mode = self.inner.test_mode))]
    pub async fn send(&self, to: &str, text: &str) -> Result<String, SmsError> {
        if self.inner.test_mode {
            info!(chars = text.chars().count(), text = %text, "SMS test mode, not sending");
            return Ok(format!("test-{}", uuid::Uuid::new_v4()));
        }

        let response = self
            .inner
            .client
            .post(format!("{}/sms", self.inner.api_url))
            .basic_auth(&self.inner.username, Some(self.inner.password.expose_secret()))
            .form(&[("from", self.inner.from.as_str()), ("to", to), ("message", text)])
            .send()
            .await?;

        let sent: SendResponse = Self::handle_response(response).await?;
        info!(provider_message_id = %sent.id, "SMS sent");
        Ok(sent.id)
    }

    /// Remaining account balance.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be reached or rejects the credentials.
    #[instrument(skip(self))]
    pub async fn balance(&self) -> Result<SmsBalance, SmsError> {
        let response = self
            .inner
            .client
            .get(format!("{}/me", self.inner.api_url))
            .basic_auth(&self.inner.username, Some(self.inner.password.expose_secret()))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SmsError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| SmsError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    async fn parse_error(response: reqwest::Response) -> SmsError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return SmsError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return SmsError::Unauthorized;
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status >= 500 {
            SmsError::Server { status, message }
        } else {
            SmsError::Rejected { status, message }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(test_mode: bool) -> SmsConfig {
        SmsConfig {
            api_url: "http://127.0.0.1:9/a1/".to_string(),
            username: "u123".to_string(),
            password: SecretString::from("sms-password"),
            from: "Foodbank".to_string(),
            test_mode,
        }
    }

    #[tokio::test]
    async fn test_test_mode_does_not_call_provider() {
        // Port 9 is discard; a real request would fail.
        let client = SmsClient::new(&config(true)).unwrap();
        let id = client.send("+46701234567", "Hej!").await.unwrap();
        assert!(id.starts_with("test-"));
    }

    #[test]
    fn test_trailing_slash_trimmed_and_secret_redacted() {
        let client = SmsClient::new(&config(false)).unwrap();
        assert_eq!(client.inner.api_url, "http://127.0.0.1:9/a1");
        assert!(!format!("{client:?}").contains("sms-password"));
    }
}
