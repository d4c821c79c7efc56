//! # TaskHub Worker Library
//!
//! Background jobs that run beside the API server against the same
//! database.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `reminders`: deadline reminder sweep

pub mod config;
pub mod reminders;
