//! Foodbank Core - Shared domain types and rules.
//!
//! This crate provides the types and pure rules used across all Foodbank
//! components:
//! - `admin` - Staff-facing server (GitHub-gated)
//! - `cli` - Command-line tools for migrations and the SMS queue
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Everything here can be tested without
//! a running database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, phone numbers, postal codes, statuses
//! - [`schedule`] - The date-only "upcoming parcel" predicate
//! - [`confirmation`] - Name normalization for destructive-action confirmations
//! - [`removal`] - Removal outcomes and machine-readable error codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod confirmation;
pub mod removal;
pub mod schedule;
pub mod types;

pub use confirmation::{confirmation_matches, normalize_name};
pub use removal::{RemovalErrorCode, RemovalOutcome};
pub use schedule::{is_upcoming, start_of_day};
pub use types::*;
