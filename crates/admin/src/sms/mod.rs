//! SMS provider integration.
//!
//! The provider speaks a small form-encoded HTTP API with basic auth:
//! `POST {api_url}/sms` sends a message, `GET {api_url}/me` reports the
//! account balance.

mod client;
mod error;
pub mod templates;

pub use client::{SmsBalance, SmsClient};
pub use error::SmsError;
pub use templates::{SmsContext, render};
