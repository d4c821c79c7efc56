//! # TaskHub Shared Library
//!
//! Domain types, storage and business rules shared by the TaskHub API server
//! and the reminder worker.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, session store, access-control guard
//! - `db`: PostgreSQL pool and migrations
//! - `error`: the domain error taxonomy
//! - `feed`: change detection and per-subscriber polling for live updates
//! - `models`: rows, inputs and their PostgreSQL queries
//! - `notify`: notification rendering and mail transports
//! - `repository`: task, comment and user business rules
//! - `store`: storage traits with PostgreSQL and in-memory backends

pub mod auth;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod repository;
pub mod store;

/// Current version of the TaskHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
