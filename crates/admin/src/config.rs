//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BASE_URL` - Public URL of the server (used for the OAuth callback)
//! - `SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `GITHUB_CLIENT_ID` - GitHub OAuth app client ID
//! - `GITHUB_CLIENT_SECRET` - GitHub OAuth app client secret
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `GITHUB_ORG` - Organization whose members may sign in. When unset every
//!   request is rejected with `CONFIGURATION_ERROR`.
//! - `MEMBERSHIP_RECHECK_MINUTES` - How long a membership check is trusted (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `TZ` - Operating time zone of the organization; decides what "today" means
//!
//! ## Optional (SMS - all four together)
//! - `SMS_API_URL` - Provider base URL
//! - `SMS_USERNAME` - Provider account
//! - `SMS_PASSWORD` - Provider password
//! - `SMS_FROM` - Sender name shown to recipients
//! - `SMS_TEST_MODE` - `true` to log messages instead of sending them
//!
//! ## Optional (TLS)
//! - `TLS_CERT` - PEM-encoded certificate chain
//! - `TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_MEMBERSHIP_RECHECK_MINUTES: i64 = 60;
const GITHUB_OAUTH_BASE: &str = "https://github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the server
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// GitHub OAuth and organization settings
    pub github: GithubConfig,
    /// SMS provider configuration (optional - SMS disabled when absent)
    pub sms: Option<SmsConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// GitHub OAuth configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GithubConfig {
    /// OAuth app client ID
    pub client_id: String,
    /// OAuth app client secret
    pub client_secret: SecretString,
    /// Organization whose members are allowed in
    pub organization: Option<String>,
    /// How long a positive or negative membership check is trusted
    pub membership_recheck: chrono::Duration,
    /// Base URL for the OAuth endpoints (overridable for tests)
    pub oauth_base: String,
    /// Base URL for the REST API (overridable for tests)
    pub api_base: String,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("organization", &self.organization)
            .field("membership_recheck", &self.membership_recheck)
            .finish_non_exhaustive()
    }
}

impl GithubConfig {
    /// Configuration pointing at the public GitHub endpoints.
    #[must_use]
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        organization: Option<String>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            organization,
            membership_recheck: chrono::Duration::minutes(DEFAULT_MEMBERSHIP_RECHECK_MINUTES),
            oauth_base: GITHUB_OAUTH_BASE.to_string(),
            api_base: GITHUB_API_BASE.to_string(),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let recheck_minutes = get_env_or_default(
            "MEMBERSHIP_RECHECK_MINUTES",
            &DEFAULT_MEMBERSHIP_RECHECK_MINUTES.to_string(),
        )
        .parse::<i64>()
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "MEMBERSHIP_RECHECK_MINUTES".to_string(),
                "must be a positive number of minutes".to_string(),
            )
        })?;

        let organization = get_optional_env("GITHUB_ORG").filter(|org| !org.trim().is_empty());
        if organization.is_none() {
            tracing::warn!("GITHUB_ORG is not set; every request will fail authorization");
        }

        Ok(Self {
            membership_recheck: chrono::Duration::minutes(recheck_minutes),
            ..Self::new(
                get_required_env("GITHUB_CLIENT_ID")?,
                get_validated_secret("GITHUB_CLIENT_SECRET")?,
                organization,
            )
        })
    }
}

/// SMS provider configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmsConfig {
    /// Provider base URL
    pub api_url: String,
    /// Provider account name
    pub username: String,
    /// Provider password
    pub password: SecretString,
    /// Sender name shown on the recipient's phone
    pub from: String,
    /// Log messages instead of sending them
    pub test_mode: bool,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl SmsConfig {
    /// Load SMS configuration from environment.
    ///
    /// Returns `None` if none of the variables are set (SMS disabled).
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let api_url = get_optional_env("SMS_API_URL");
        let username = get_optional_env("SMS_USERNAME");
        let password = get_optional_env("SMS_PASSWORD");
        let from = get_optional_env("SMS_FROM");

        match (api_url, username, password, from) {
            (Some(api_url), Some(username), Some(password), Some(from)) => {
                validate_secret_strength(&password, "SMS_PASSWORD")?;
                let test_mode = get_optional_env("SMS_TEST_MODE")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
                Ok(Some(Self {
                    api_url: api_url.trim_end_matches('/').to_string(),
                    username,
                    password: SecretString::from(password),
                    from,
                    test_mode,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SMS_*".to_string(),
                "SMS_API_URL, SMS_USERNAME, SMS_PASSWORD and SMS_FROM must be set together"
                    .to_string(),
            )),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("TLS_CERT");
        let key_pem = get_optional_env("TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "TLS_*".to_string(),
                "Both TLS_CERT and TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let session_secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SESSION_SECRET")?;

        let github = GithubConfig::from_env()?;
        let sms = SmsConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        if get_optional_env("TZ").is_none() {
            tracing::warn!("TZ is not set; \"today\" follows the host's local time zone");
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            github,
            sms,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// The OAuth callback URL registered with GitHub.
    #[must_use]
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/github/callback", self.base_url)
    }

    /// Returns a reference to the SMS configuration, if available.
    #[must_use]
    pub const fn sms(&self) -> Option<&SmsConfig> {
        self.sms.as_ref()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
