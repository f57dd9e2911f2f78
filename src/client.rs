//! HTTP client for the AIMS identity service.
//!
//! `AimsClient` wraps a `reqwest::Client` configured with explicit timeouts
//! and a base URL (resolved from [`AuthConfig`] or overridden for tests).
//! All calls go to `{base_url}/aims/v1/...`.
//!
//! Error responses are never discarded: the status, the
//! `X-AIMS-Session-Token` header and the raw body are kept in
//! [`AuthError::Api`] so the login flow can decode structured error codes
//! such as `mfa_code_required`. Nothing here retries.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::session::SessionDescriptor;

/// Header carrying the short-lived token exchanged between handshake steps.
pub const SESSION_TOKEN_HEADER: &str = "X-AIMS-Session-Token";

/// The three identity calls the login handshake is made of.
///
/// Implemented by [`AimsClient`]; the authentication flow is generic over
/// this trait so it can be driven by a scripted fake in tests.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Submits a username and password.
    async fn authenticate(&self, user_name: &str, password: &str) -> Result<SessionDescriptor>;

    /// Completes a login that stopped at MFA verification.
    async fn authenticate_with_mfa_session_token(
        &self,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<SessionDescriptor>;

    /// Completes a login that stopped at terms-of-service acceptance.
    async fn accept_terms_of_service(&self, session_token: &str) -> Result<SessionDescriptor>;
}

#[derive(Serialize)]
struct MfaCodeRequest<'a> {
    mfa_code: &'a str,
}

#[derive(Serialize)]
struct AcceptTosRequest {
    accept_tos: bool,
}

#[derive(Serialize)]
struct EnrollMfaRequest<'a> {
    mfa_uri: &'a str,
    mfa_codes: &'a [&'a str],
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    email: &'a str,
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    email: &'a str,
    return_to: &'a str,
}

#[derive(Serialize)]
struct NewPasswordRequest<'a> {
    password: &'a str,
}

/// Client for the `/aims/v1` identity endpoints.
#[derive(Debug, Clone)]
pub struct AimsClient {
    client: Client,
    base_url: String,
}

impl AimsClient {
    /// Builds a client from runtime configuration.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(AimsClient {
            client,
            base_url: config.aims_base_url(),
        })
    }

    /// Builds a client with default timeouts against an explicit base URL.
    /// Used by tests to point at a local mock server.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let config = AuthConfig {
            base_url: Some(base_url.to_string()),
            ..AuthConfig::default()
        };
        Self::new(&config)
    }

    /// Base URL requests are sent to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/aims/v1/{}", self.base_url, path)
    }

    /// Sends a request and returns the raw body of a success response.
    ///
    /// The body is read before the status is checked so that error
    /// responses keep their diagnostic payload.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let session_token = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AuthError::Api {
                status,
                session_token,
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Registers an MFA device using the session token from an
    /// `mfa_enrollment_required` rejection.
    ///
    /// `codes` are consecutive one-time codes generated from `mfa_uri`.
    pub async fn enroll_mfa(&self, mfa_uri: &str, session_token: &str, codes: &[&str]) -> Result<()> {
        let request = self
            .client
            .post(self.url("user/mfa/enroll"))
            .header(SESSION_TOKEN_HEADER, session_token)
            .json(&EnrollMfaRequest {
                mfa_uri,
                mfa_codes: codes,
            });
        self.send(request).await.map(drop)
    }

    /// Changes a password, typically after a `password_expired` rejection.
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let request = self
            .client
            .post(self.url("change_password"))
            .json(&ChangePasswordRequest {
                email,
                current_password,
                new_password,
            });
        self.send(request).await.map(drop)
    }

    /// Starts the emailed password-reset process. `return_to` is the URL the
    /// reset link sends the user back to.
    pub async fn initiate_password_reset(&self, email: &str, return_to: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url("reset_password"))
            .json(&ResetPasswordRequest { email, return_to });
        self.send(request).await.map(drop)
    }

    /// Finishes a password reset with the token from the emailed link.
    pub async fn reset_password_with_token(&self, token: &str, password: &str) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("reset_password/{token}")))
            .json(&NewPasswordRequest { password });
        self.send(request).await.map(drop)
    }
}

#[async_trait]
impl IdentityApi for AimsClient {
    async fn authenticate(&self, user_name: &str, password: &str) -> Result<SessionDescriptor> {
        let request = self
            .client
            .post(self.url("authenticate"))
            .basic_auth(user_name, Some(password))
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    async fn authenticate_with_mfa_session_token(
        &self,
        session_token: &str,
        mfa_code: &str,
    ) -> Result<SessionDescriptor> {
        let request = self
            .client
            .post(self.url("authenticate"))
            .header(SESSION_TOKEN_HEADER, session_token)
            .json(&MfaCodeRequest { mfa_code });
        self.send_json(request).await
    }

    async fn accept_terms_of_service(&self, session_token: &str) -> Result<SessionDescriptor> {
        let request = self
            .client
            .post(self.url("authenticate"))
            .header(SESSION_TOKEN_HEADER, session_token)
            .json(&AcceptTosRequest { accept_tos: true });
        self.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Residency;

    #[test]
    fn url_joins_base_and_versioned_path() {
        let client = AimsClient::with_base_url("http://localhost:9000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(
            client.url("authenticate"),
            "http://localhost:9000/aims/v1/authenticate"
        );
    }

    #[test]
    fn new_resolves_base_url_from_config() {
        let config = AuthConfig {
            residency: Residency::Emea,
            ..AuthConfig::default()
        };
        let client = AimsClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://api.cloudinsight.alertlogic.co.uk");
    }

    #[test]
    fn mfa_request_serializes_code() {
        let json = serde_json::to_value(MfaCodeRequest { mfa_code: "123456" }).unwrap();
        assert_eq!(json, serde_json::json!({"mfa_code": "123456"}));
    }

    #[test]
    fn enroll_request_serializes_codes_array() {
        let codes = ["123456", "456789"];
        let json = serde_json::to_value(EnrollMfaRequest {
            mfa_uri: "otpauth://totp/x",
            mfa_codes: &codes,
        })
        .unwrap();
        assert_eq!(json["mfa_codes"], serde_json::json!(["123456", "456789"]));
        assert_eq!(json["mfa_uri"], "otpauth://totp/x");
    }
}
