//! Integration tests for the SMS dispatch pass.
//!
//! The queue lives in an in-memory outbox that follows the repository's
//! rules: transitions only apply to `sending` records, a retry for an
//! anonymized household cancels, and unsettled claims are picked up again
//! once the lease runs out.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use foodbank_admin::config::SmsConfig;
use foodbank_admin::db::RepositoryError;
use foodbank_admin::models::SmsRecord;
use foodbank_admin::services::sms_queue::{
    DispatchReport, SENDING_LEASE_MINUTES, SmsOutbox, dispatch_due,
};
use foodbank_admin::sms::SmsClient;
use foodbank_core::{HouseholdId, SmsId, SmsIntent, SmsStatus};

// =============================================================================
// In-memory outbox
// =============================================================================

struct Entry {
    record: SmsRecord,
    claimed_at: Option<DateTime<Utc>>,
    household_anonymized: bool,
}

#[derive(Default)]
struct MemoryOutbox {
    entries: Mutex<HashMap<SmsId, Entry>>,
    broken_writes: Mutex<Vec<SmsId>>,
}

impl MemoryOutbox {
    fn push(&self, text: &str, anonymized: bool, due: DateTime<Utc>) -> SmsId {
        let id = SmsId::generate();
        let record = SmsRecord {
            id,
            intent: SmsIntent::PickupReminder,
            household_id: HouseholdId::generate(),
            parcel_id: None,
            to_e164: "+46701234567".to_string(),
            text: text.to_string(),
            status: SmsStatus::Queued,
            attempt_count: 0,
            next_attempt_at: due,
            last_error: None,
            provider_message_id: None,
            sent_at: None,
            created_at: due,
        };
        self.entries.lock().unwrap().insert(
            id,
            Entry {
                record,
                claimed_at: None,
                household_anonymized: anonymized,
            },
        );
        id
    }

    fn status(&self, id: SmsId) -> SmsStatus {
        self.entries.lock().unwrap()[&id].record.status
    }

    fn anonymize(&self, id: SmsId) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id).unwrap();
        entry.household_anonymized = true;
        entry.record.to_e164 = "+46000000000".to_string();
        entry.record.text = String::new();
    }

    fn break_writes_for(&self, id: SmsId) {
        self.broken_writes.lock().unwrap().push(id);
    }

    fn heal(&self) {
        self.broken_writes.lock().unwrap().clear();
    }

    fn write(&self, id: SmsId, apply: impl FnOnce(&mut Entry)) -> Result<(), RepositoryError> {
        if self.broken_writes.lock().unwrap().contains(&id) {
            return Err(RepositoryError::DataCorruption("connection reset".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&id)
            && entry.record.status == SmsStatus::Sending
        {
            apply(entry);
        }
        Ok(())
    }
}

impl SmsOutbox for MemoryOutbox {
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SmsRecord>, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        let mut due: Vec<&mut Entry> = entries
            .values_mut()
            .filter(|e| match e.record.status {
                SmsStatus::Queued | SmsStatus::Retrying => e.record.next_attempt_at <= now,
                SmsStatus::Sending => e.claimed_at.is_some_and(|at| at < stale_before),
                _ => false,
            })
            .collect();
        due.sort_by_key(|e| e.record.next_attempt_at);

        Ok(due
            .into_iter()
            .take(usize::try_from(limit).unwrap())
            .map(|e| {
                e.record.status = SmsStatus::Sending;
                e.record.attempt_count += 1;
                e.claimed_at = Some(now);
                e.record.clone()
            })
            .collect())
    }

    async fn mark_sent(
        &self,
        id: SmsId,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.write(id, |e| {
            e.record.status = SmsStatus::Sent;
            e.record.provider_message_id = Some(provider_message_id.to_string());
            e.record.sent_at = Some(now);
        })
    }

    async fn schedule_retry(
        &self,
        id: SmsId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Option<SmsStatus>, RepositoryError> {
        let mut written = None;
        self.write(id, |e| {
            e.record.status = if e.household_anonymized {
                SmsStatus::Cancelled
            } else {
                SmsStatus::Retrying
            };
            e.record.last_error = Some(error.to_string());
            e.record.next_attempt_at = next_attempt_at;
            written = Some(e.record.status);
        })?;
        Ok(written)
    }

    async fn mark_failed(&self, id: SmsId, error: &str) -> Result<(), RepositoryError> {
        self.write(id, |e| {
            e.record.status = SmsStatus::Failed;
            e.record.last_error = Some(error.to_string());
        })
    }

    async fn cancel(&self, id: SmsId) -> Result<(), RepositoryError> {
        self.write(id, |e| e.record.status = SmsStatus::Cancelled)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-19T08:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn client(server: &MockServer) -> SmsClient {
    SmsClient::new(&SmsConfig {
        api_url: server.uri(),
        username: "u-foodbank".to_string(),
        password: SecretString::from("provider-pass"),
        from: "Foodbank".to_string(),
        test_mode: false,
    })
    .unwrap()
}

async fn provider(template: ResponseTemplate, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(template)
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"id": "s8f2a1", "status": "created"}))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_due_message_is_sent() {
    let server = provider(accepted(), 1).await;
    let outbox = MemoryOutbox::default();
    let id = outbox.push("Hej!", false, now());

    let report = dispatch_due(&outbox, &client(&server), now(), 10).await.unwrap();

    assert_eq!(
        report,
        DispatchReport {
            sent: 1,
            ..DispatchReport::default()
        }
    );
    assert_eq!(outbox.status(id), SmsStatus::Sent);
}

#[tokio::test]
async fn test_scrubbed_message_is_cancelled_without_sending() {
    let server = provider(accepted(), 0).await;
    let outbox = MemoryOutbox::default();
    let id = outbox.push("", true, now());

    let report = dispatch_due(&outbox, &client(&server), now(), 10).await.unwrap();

    assert_eq!(report.cancelled, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(outbox.status(id), SmsStatus::Cancelled);
}

#[tokio::test]
async fn test_failed_send_for_anonymized_household_is_not_retried() {
    let server = provider(ResponseTemplate::new(503).set_body_string("maintenance"), 1).await;
    let outbox = MemoryOutbox::default();
    let id = outbox.push("Hej!", false, now());

    // The household is anonymized while the send is in flight.
    let claimed = outbox
        .claim_due(now(), now() - Duration::minutes(SENDING_LEASE_MINUTES), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    outbox.anonymize(id);
    let status = outbox
        .schedule_retry(id, "SMS provider error: 503", now() + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(status, Some(SmsStatus::Cancelled));

    let later = now() + Duration::hours(2);
    let report = dispatch_due(&outbox, &client(&server), later, 10).await.unwrap();
    assert_eq!(report, DispatchReport::default());

    // A fresh record for a household anonymized mid-dispatch.
    let other = outbox.push("Hej igen!", true, later);
    let report = dispatch_due(&outbox, &client(&server), later, 10).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.retried, 0);
    assert_eq!(outbox.status(other), SmsStatus::Cancelled);
}

#[tokio::test]
async fn test_failed_write_does_not_stop_the_pass() {
    let server = provider(accepted(), 3).await;
    let outbox = MemoryOutbox::default();
    let stuck = outbox.push("Först", false, now() - Duration::minutes(2));
    let second = outbox.push("Sedan", false, now() - Duration::minutes(1));
    outbox.break_writes_for(stuck);

    let report = dispatch_due(&outbox, &client(&server), now(), 10).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.unrecorded, 1);
    assert_eq!(outbox.status(second), SmsStatus::Sent);
    assert_eq!(outbox.status(stuck), SmsStatus::Sending);

    // Still inside the lease: nothing to claim.
    outbox.heal();
    let soon = now() + Duration::minutes(1);
    let report = dispatch_due(&outbox, &client(&server), soon, 10).await.unwrap();
    assert_eq!(report, DispatchReport::default());

    // Lease expired: the stuck record is claimed and settled.
    let later = now() + Duration::minutes(SENDING_LEASE_MINUTES + 1);
    let report = dispatch_due(&outbox, &client(&server), later, 10).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(outbox.status(stuck), SmsStatus::Sent);
}

#[tokio::test]
async fn test_rejected_message_fails_permanently() {
    let server = provider(ResponseTemplate::new(400).set_body_string("Invalid 'to' number"), 1).await;
    let outbox = MemoryOutbox::default();
    let id = outbox.push("Hej!", false, now());

    let report = dispatch_due(&outbox, &client(&server), now(), 10).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(outbox.status(id), SmsStatus::Failed);
}
