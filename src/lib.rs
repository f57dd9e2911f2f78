//! Async Rust client for the AIMS identity service and its login flow.
//!
//! Provides a typed HTTP client for the `/aims/v1` endpoints, a state
//! machine that walks a user through password, MFA and terms-of-service
//! steps, and the collaborators a successful session is committed to.
//!
//! # Modules
//!
//! - [`auth`] — Login / MFA / TOS flow and outcome classification.
//! - [`client`] — HTTP wrapper for the identity endpoints.
//! - [`config`] — TOML-backed runtime configuration.
//! - [`error`] — Typed error hierarchy (`AuthError`).
//! - [`locator`] — Service location resolution by environment and residency.
//! - [`session`] — Session descriptor, session stores and broadcast.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use aims_auth::auth::{AuthOutcome, AuthenticationFlow};
//! use aims_auth::client::AimsClient;
//! use aims_auth::config::AuthConfig;
//! use aims_auth::session::{MemorySessionStore, NoopBroadcast};
//!
//! let client = AimsClient::new(&AuthConfig::default())?;
//! let mut flow = AuthenticationFlow::new(
//!     client,
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(NoopBroadcast),
//! );
//! if flow.authenticate("admin@company.com", "hunter2").await?
//!     == AuthOutcome::MfaVerificationRequired
//! {
//!     flow.validate_mfa_code("123456").await?;
//! }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod locator;
pub mod session;
