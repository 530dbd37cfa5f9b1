//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::github::{GithubClient, GithubError, GithubProfile};
use crate::services::auth::Gatekeeper;
use crate::services::view_cache::ViewCache;
use crate::sms::{SmsClient, SmsError};

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build GitHub client: {0}")]
    Github(#[from] GithubError),
    #[error("failed to build SMS client: {0}")]
    Sms(#[from] SmsError),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    github: GithubClient,
    sms: Option<SmsClient>,
    views: ViewCache,
    profiles: Cache<String, GithubProfile>,
}

impl AppState {
    /// Build the state, creating the HTTP clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, StateError> {
        let github = GithubClient::new(&config.github)?;
        let sms = config.sms().map(SmsClient::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                github,
                sms,
                views: ViewCache::default(),
                profiles: Cache::builder()
                    .max_capacity(500)
                    .time_to_live(Duration::from_secs(3600))
                    .build(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn github(&self) -> &GithubClient {
        &self.inner.github
    }

    /// The SMS client, `None` when SMS is not configured.
    #[must_use]
    pub fn sms(&self) -> Option<&SmsClient> {
        self.inner.sms.as_ref()
    }

    #[must_use]
    pub fn views(&self) -> &ViewCache {
        &self.inner.views
    }

    /// GitHub profiles of comment authors, keyed by login.
    #[must_use]
    pub fn profiles(&self) -> &Cache<String, GithubProfile> {
        &self.inner.profiles
    }

    #[must_use]
    pub const fn gatekeeper(&self) -> Gatekeeper<'_> {
        Gatekeeper::new(self)
    }
}
