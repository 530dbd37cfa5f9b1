//! SMS queue commands.
//!
//! Meant to run from cron every few minutes. Requires the full server
//! configuration because the SMS provider credentials live there.

use chrono::{Local, Utc};

use foodbank_admin::config::{AppConfig, ConfigError};
use foodbank_admin::error::AppError;
use foodbank_admin::services::SmsQueueService;
use foodbank_admin::sms::{SmsClient, SmsError};

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SmsCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("SMS provider error: {0}")]
    Provider(#[from] SmsError),

    #[error("{0}")]
    Queue(#[from] AppError),
}

async fn service() -> Result<SmsQueueService, SmsCommandError> {
    let config = AppConfig::from_env()?;
    let sms = config.sms().map(SmsClient::new).transpose()?;
    if sms.is_none() {
        tracing::warn!("SMS provider not configured; nothing will be sent");
    }
    let pool = connect().await?;
    Ok(SmsQueueService::new(pool, sms))
}

/// Queue reminders for parcels picked up within the next 48 hours.
pub async fn reminders() -> Result<(), SmsCommandError> {
    let queued = service().await?.queue_reminders(&Local::now()).await?;
    tracing::info!(queued, "Pickup reminders queued");
    Ok(())
}

/// Queue reminders, then send up to `limit` due messages.
pub async fn dispatch(limit: i64) -> Result<(), SmsCommandError> {
    let queue = service().await?;

    let queued = queue.queue_reminders(&Local::now()).await?;
    let report = queue.dispatch_due(Utc::now(), limit.max(1)).await?;
    tracing::info!(
        queued,
        sent = report.sent,
        retried = report.retried,
        failed = report.failed,
        cancelled = report.cancelled,
        unrecorded = report.unrecorded,
        "SMS dispatch complete"
    );
    Ok(())
}
