//! Typed error hierarchy for the aims-auth crate.
//!
//! `AuthError` separates three kinds of failure that callers must treat
//! differently:
//! - Remote failures (`Api`, `Network`, `Parse`). The authentication flow
//!   folds these into an [`AuthOutcome`](crate::auth::AuthOutcome) and never
//!   returns them; direct users of [`AimsClient`](crate::client::AimsClient)
//!   see them as-is.
//! - Sequencing bugs (`MissingSessionToken`, `MissingTermsOfServiceUrl`).
//!   A follow-up step was called before the value it depends on was captured.
//! - Local collaborator failures (`Session`, `Config`).

use reqwest::StatusCode;

/// Unified error type for all aims-auth operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The identity service answered with a non-success HTTP status.
    ///
    /// The raw body is kept so the flow can decode the structured error code
    /// (`{"error": "mfa_code_required"}` and friends) and so diagnostics
    /// survive when the body is not JSON at all.
    #[error("API error {status}: {body}")]
    Api {
        /// The HTTP status code returned by the identity service.
        status: StatusCode,
        /// Value of the `X-AIMS-Session-Token` response header, if present.
        session_token: Option<String>,
        /// The raw response body text, or an empty string if unreadable.
        body: String,
    },

    /// Transport-level failure (DNS, TCP, TLS, timeout). No status code
    /// is available because no response was received.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A step that needs the mid-flow session token was called before one
    /// was captured.
    #[error("invalid usage: no session token is available")]
    MissingSessionToken,

    /// The terms-of-service URL was requested before the identity service
    /// provided one.
    #[error("invalid usage: no terms of service URL is available")]
    MissingTermsOfServiceUrl,

    /// Persisting or broadcasting an authenticated session failed.
    #[error("session commit failed: {message}")]
    Session {
        /// What was being done when the failure happened.
        message: String,
        /// The underlying I/O or serialization error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration could not be loaded or contained an invalid value.
    #[error("invalid configuration: {message}")]
    Config {
        /// Human-readable description, including the offending value.
        message: String,
        /// The underlying I/O or TOML error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, AuthError>;
