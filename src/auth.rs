//! Login / MFA / terms-of-service authentication flow.
//!
//! [`AuthenticationFlow`] drives a multi-step handshake against an
//! [`IdentityApi`]:
//!
//! ```text
//! authenticate ──► Authenticated
//!      │
//!      ├──► MfaVerificationRequired ── validate_mfa_code ──► ...
//!      ├──► TosAcceptanceRequired ─── accept_terms_of_service ──► ...
//!      └──► AccountLocked | AccountUnavailable | PasswordResetRequired
//!           | InvalidCredentials
//! ```
//!
//! Every rejection from the identity service is folded into an
//! [`AuthOutcome`]; the `Err` side of the attempt methods is reserved for
//! caller sequencing bugs and for failures to commit a successful session.
//!
//! Invariants:
//! - Each attempt method sends at most one request and never retries.
//! - A successful attempt commits the session exactly once: session store
//!   first, then broadcast.
//! - Attempt methods take `&mut self`, so one flow cannot run two attempts
//!   at the same time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::IdentityApi;
use crate::error::{AuthError, Result};
use crate::session::{SessionBroadcast, SessionDescriptor, SessionStore};

// Structured `error` codes the identity service uses to ask for more steps.
const MFA_CODE_REQUIRED: &str = "mfa_code_required";
const MFA_ENROLLMENT_REQUIRED: &str = "mfa_enrollment_required";
const ACCEPT_TOS_REQUIRED: &str = "accept_tos_required";
const PASSWORD_EXPIRED: &str = "password_expired";

/// Outcome of an authentication attempt.
///
/// Serialized with the identity service's names for each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthOutcome {
    /// No attempt has been made yet.
    #[default]
    #[serde(rename = "unauthenticated")]
    Unauthenticated,
    /// The session was established and committed.
    #[serde(rename = "authenticated")]
    Authenticated,
    /// Too many failures or an administrative lock.
    #[serde(rename = "account_locked")]
    AccountLocked,
    /// The account exists but may not sign in.
    #[serde(rename = "account_unavailable")]
    AccountUnavailable,
    /// The password must be changed before signing in.
    #[serde(rename = "password_expired")]
    PasswordResetRequired,
    /// Reserved by the identity service; enrollment demands are currently
    /// reported as [`AuthOutcome::MfaVerificationRequired`].
    #[serde(rename = "mfa_enrollment_required")]
    MfaEnrollmentRequired,
    /// Call [`AuthenticationFlow::validate_mfa_code`] next.
    #[serde(rename = "mfa_verification_required")]
    MfaVerificationRequired,
    /// Call [`AuthenticationFlow::accept_terms_of_service`] next.
    #[serde(rename = "eula_acceptance_required")]
    TosAcceptanceRequired,
    /// Wrong credentials, or a failure that could not be classified.
    #[serde(rename = "failed")]
    InvalidCredentials,
}

impl AuthOutcome {
    /// True when no follow-up call can change the outcome of this attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuthOutcome::Authenticated
                | AuthOutcome::InvalidCredentials
                | AuthOutcome::AccountLocked
                | AuthOutcome::AccountUnavailable
        )
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthOutcome::Unauthenticated => "unauthenticated",
            AuthOutcome::Authenticated => "authenticated",
            AuthOutcome::AccountLocked => "account locked",
            AuthOutcome::AccountUnavailable => "account unavailable",
            AuthOutcome::PasswordResetRequired => "password reset required",
            AuthOutcome::MfaEnrollmentRequired => "MFA enrollment required",
            AuthOutcome::MfaVerificationRequired => "MFA verification required",
            AuthOutcome::TosAcceptanceRequired => "terms of service acceptance required",
            AuthOutcome::InvalidCredentials => "invalid credentials",
        };
        f.write_str(name)
    }
}

/// Everything captured over the course of one login attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Latest outcome.
    pub result: AuthOutcome,
    /// Mid-flow token handed out with MFA demands, sent back as
    /// `X-AIMS-Session-Token` by the follow-up steps.
    #[serde(default)]
    pub session_token: Option<String>,
    /// User name of the current attempt.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Where the current terms of service can be read.
    #[serde(default)]
    pub terms_of_service_url: Option<String>,
}

/// What an attempt does with a failure it cannot classify.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    InvalidCredentials,
    KeepPrevious,
}

/// Decoded form of an identity-service error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rejection {
    status: u16,
    code: Option<String>,
    tos_url: Option<String>,
    session_token: Option<String>,
}

impl Rejection {
    /// Decodes an API error response.
    ///
    /// Returns `None` for transport and parse errors. A body that is empty,
    /// not JSON, or not a JSON object carries no error code, so only the
    /// status is left to classify.
    pub(crate) fn decode(err: &AuthError) -> Option<Self> {
        let AuthError::Api {
            status,
            session_token,
            body,
        } = err
        else {
            return None;
        };

        let fields = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);

        Some(Rejection {
            status: status.as_u16(),
            code: text("error"),
            tos_url: text("tos_url"),
            session_token: session_token.clone(),
        })
    }

    /// Maps the rejection to an outcome. Coded 401s are checked before the
    /// bare status so they are not mistaken for bad credentials.
    pub(crate) fn classify(&self) -> Option<AuthOutcome> {
        let outcome = match (self.status, self.code.as_deref()) {
            (401, Some(MFA_CODE_REQUIRED | MFA_ENROLLMENT_REQUIRED)) => {
                AuthOutcome::MfaVerificationRequired
            }
            (401, Some(ACCEPT_TOS_REQUIRED)) => AuthOutcome::TosAcceptanceRequired,
            (400, Some(PASSWORD_EXPIRED)) => AuthOutcome::PasswordResetRequired,
            (400, _) => AuthOutcome::AccountLocked,
            (401, _) => AuthOutcome::InvalidCredentials,
            (403, _) => AuthOutcome::AccountUnavailable,
            _ => return None,
        };
        Some(outcome)
    }
}

/// Drives one login through the identity service and commits the resulting
/// session.
pub struct AuthenticationFlow<A> {
    api: A,
    store: Arc<dyn SessionStore>,
    broadcast: Arc<dyn SessionBroadcast>,
    state: AuthState,
}

impl<A: IdentityApi> AuthenticationFlow<A> {
    /// Creates a flow in the `Unauthenticated` state.
    pub fn new(api: A, store: Arc<dyn SessionStore>, broadcast: Arc<dyn SessionBroadcast>) -> Self {
        Self::with_state(api, store, broadcast, AuthState::default())
    }

    /// Creates a flow that resumes from previously captured state, e.g. a
    /// session token obtained by another process.
    pub fn with_state(
        api: A,
        store: Arc<dyn SessionStore>,
        broadcast: Arc<dyn SessionBroadcast>,
        state: AuthState,
    ) -> Self {
        AuthenticationFlow {
            api,
            store,
            broadcast,
            state,
        }
    }

    /// Starts a new attempt with a username and password.
    ///
    /// Unclassifiable failures (5xx, malformed bodies, transport errors)
    /// end in `InvalidCredentials`.
    pub async fn authenticate(&mut self, user_name: &str, password: &str) -> Result<AuthOutcome> {
        self.state = AuthState {
            user_name: Some(user_name.to_string()),
            ..AuthState::default()
        };
        tracing::debug!(user = user_name, "authenticating with credentials");

        let response = self.api.authenticate(user_name, password).await;
        self.conclude(response, Fallback::InvalidCredentials).await
    }

    /// Submits an MFA code together with the captured session token.
    ///
    /// Fails with [`AuthError::MissingSessionToken`] before sending anything
    /// if no token has been captured.
    pub async fn validate_mfa_code(&mut self, mfa_code: &str) -> Result<AuthOutcome> {
        let session_token = self.session_token()?.to_owned();
        tracing::debug!("submitting MFA code");

        let response = self
            .api
            .authenticate_with_mfa_session_token(&session_token, mfa_code)
            .await;
        self.conclude(response, Fallback::InvalidCredentials).await
    }

    /// Accepts the terms of service using the captured session token.
    ///
    /// Unlike the other steps, an unclassifiable failure leaves the previous
    /// outcome in place.
    pub async fn accept_terms_of_service(&mut self) -> Result<AuthOutcome> {
        let session_token = self.session_token()?.to_owned();
        tracing::debug!("accepting terms of service");

        let response = self.api.accept_terms_of_service(&session_token).await;
        self.conclude(response, Fallback::KeepPrevious).await
    }

    /// Latest outcome; `Unauthenticated` until an attempt has been made.
    pub fn result(&self) -> AuthOutcome {
        self.state.result
    }

    /// Session token captured by the last MFA demand.
    pub fn session_token(&self) -> Result<&str> {
        self.state
            .session_token
            .as_deref()
            .ok_or(AuthError::MissingSessionToken)
    }

    /// Terms-of-service URL captured by the last TOS demand.
    pub fn terms_of_service_url(&self) -> Result<&str> {
        self.state
            .terms_of_service_url
            .as_deref()
            .ok_or(AuthError::MissingTermsOfServiceUrl)
    }

    /// User name of the current attempt.
    pub fn user_name(&self) -> Option<&str> {
        self.state.user_name.as_deref()
    }

    /// Full captured state, e.g. for handing the flow to another process.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    async fn conclude(
        &mut self,
        response: Result<SessionDescriptor>,
        fallback: Fallback,
    ) -> Result<AuthOutcome> {
        let err = match response {
            Ok(session) => return self.finalize_session(session).await,
            Err(err) => err,
        };

        if let Some(outcome) = self.handle_failure(&err) {
            tracing::info!(outcome = %outcome, "authentication attempt rejected");
            return Ok(outcome);
        }

        tracing::warn!(error = %err, "unclassified authentication failure");
        if let Fallback::InvalidCredentials = fallback {
            self.state.result = AuthOutcome::InvalidCredentials;
        }
        Ok(self.state.result)
    }

    async fn finalize_session(&mut self, session: SessionDescriptor) -> Result<AuthOutcome> {
        self.store.set_authentication(&session).await?;
        self.broadcast.set_session(&session).await?;
        self.state.result = AuthOutcome::Authenticated;
        tracing::info!(
            user = %session.authentication.user.email,
            account = session.authentication.account.id.as_deref().unwrap_or_default(),
            "authenticated"
        );
        Ok(self.state.result)
    }

    /// Records a classified rejection in the state. Returns `None`, leaving
    /// the state untouched, when the failure cannot be classified.
    ///
    /// An MFA demand without an `X-AIMS-Session-Token` header keeps the
    /// token already carried instead of clearing it, so the code can be
    /// retried against the same session.
    fn handle_failure(&mut self, err: &AuthError) -> Option<AuthOutcome> {
        let rejection = Rejection::decode(err)?;
        let outcome = rejection.classify()?;

        match outcome {
            AuthOutcome::MfaVerificationRequired => {
                if rejection.session_token.is_some() {
                    self.state.session_token = rejection.session_token;
                }
            }
            AuthOutcome::TosAcceptanceRequired => {
                self.state.terms_of_service_url = rejection.tos_url;
            }
            _ => {}
        }
        self.state.result = outcome;
        Some(outcome)
    }
}
