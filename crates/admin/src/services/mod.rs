//! Business logic services.
//!
//! # Services
//!
//! - `auth` - GitHub organization gate for every server action
//! - `households` - Enrollment, editing, cached views and comments
//! - `parcels` - Scheduling, cancellation and pickup outcomes
//! - `removal` - Household removal (delete or anonymize)
//! - `sms_queue` - SMS queue, dispatch and reminders
//! - `validation` - Request validation
//! - `view_cache` - Short-lived household view cache

pub mod auth;
pub mod households;
pub mod parcels;
pub mod removal;
pub mod sms_queue;
pub mod validation;
pub mod view_cache;

pub use auth::{AuthError, AuthenticatedActor, Gatekeeper, Requirement};
pub use households::HouseholdService;
pub use parcels::ParcelService;
pub use removal::{RemovalError, RemovalInput, RemovalRequest, RemovalStore, remove_household};
pub use sms_queue::{DispatchReport, SmsQueueService};
pub use validation::ValidationError;
pub use view_cache::ViewCache;
