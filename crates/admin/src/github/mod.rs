//! GitHub OAuth and REST API integration.
//!
//! Only the handful of calls the admin needs: the OAuth code exchange, the
//! signed-in user, their organization membership, and public profiles for
//! comment authors.

mod client;
mod error;
mod types;

pub use client::GithubClient;
pub use error::GithubError;
pub use types::{GithubProfile, OrgMembership};
