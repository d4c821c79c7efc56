//! # TaskHub API Server Library
//!
//! HTTP surface of TaskHub: session-cookie authentication, admin and user
//! JSON endpoints and the server-sent change feeds.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting, sessions, security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
