//! Integration tests for Foodbank.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p foodbank-integration-tests
//! ```
//!
//! None of these tests need a database. Persistence is replaced with
//! in-memory stores and the GitHub and SMS provider APIs are served by
//! `wiremock`.
//!
//! # Test Categories
//!
//! - `household_removal` - Removal preconditions and outcomes
//! - `auth_gate` - Authorization decision order and error rendering
//! - `github_client` - OAuth exchange, identity and membership lookups
//! - `sms_client` - Provider calls, error classification and retry policy

use chrono::{DateTime, FixedOffset, TimeZone};

/// The organization's zone in tests: UTC+1, no DST.
///
/// # Panics
///
/// Never; the offset is in range.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn org_zone() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

/// A local wall-clock instant in [`org_zone`].
///
/// # Panics
///
/// Panics if the date or time is out of range.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
    org_zone().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}
