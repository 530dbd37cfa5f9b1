//! Foodbank staff server library.
//!
//! Households, food parcels, pickup locations and the SMS queue, behind a
//! GitHub organization membership gate.
//!
//! # Security
//!
//! This crate handles personal data of the households a food bank serves:
//! names, phone numbers, and pickup history. Removing a household either
//! deletes it outright or anonymizes it in place when parcel history must
//! be kept.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod sms;
pub mod state;
