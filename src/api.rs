//! Backend auth REST client.
//!
//! Thin HTTP wrapper for `/auth/login`, `/auth/register`, `/auth/me` and
//! `/auth/logout`. Status/body classification lives in `classify_failure`
//! so it can be tested without a server.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and timeouts become `AuthError::Network`. Non-2xx
//! responses map to the most specific kind the endpoint can produce, using
//! the body's machine-readable `code` first and the status second; anything
//! left over becomes `AuthError::Server`. Idempotent calls retry transient
//! failures; `register` never does, so a lost response cannot turn into a
//! second account attempt.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::config::SessionConfig;
use crate::error::{AuthError, ConfigError};
use crate::types::{AuthResponse, Credentials, RegistrationFields, UserRecord};

const RETRY_BASE_DELAY_MS: u64 = 100;
const RETRY_JITTER_MS: u64 = 50;
const MAX_MESSAGE_LEN: usize = 200;

// =============================================================================
// TRAIT
// =============================================================================

/// Backend operations the auth context depends on.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for `{token, user}`.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError>;

    /// Create an account and sign it in.
    async fn register(&self, fields: &RegistrationFields) -> Result<AuthResponse, AuthError>;

    /// Resolve the user behind a bearer token.
    async fn fetch_current_user(&self, token: &str) -> Result<UserRecord, AuthError>;

    /// Revoke a token server-side. Callers treat failures as best-effort.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

// =============================================================================
// ENDPOINTS & CLASSIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    CurrentUser,
    Logout,
}

impl Endpoint {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/auth/login",
            Self::Register => "/auth/register",
            Self::CurrentUser => "/auth/me",
            Self::Logout => "/auth/logout",
        }
    }

    /// Safe to re-issue after a transient failure.
    #[must_use]
    pub fn idempotent(self) -> bool {
        !matches!(self, Self::Register)
    }

    fn produces(self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::Network => true,
            FailureKind::InvalidCredentials => self == Self::Login,
            FailureKind::Validation => matches!(self, Self::Login | Self::Register),
            FailureKind::Conflict => self == Self::Register,
            FailureKind::Unauthorized => matches!(self, Self::CurrentUser | Self::Logout),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    InvalidCredentials,
    Validation,
    Conflict,
    Unauthorized,
    Network,
}

fn kind_from_code(endpoint: Endpoint, code: &str) -> Option<FailureKind> {
    match code.trim().to_ascii_uppercase().as_str() {
        "INVALID_CREDENTIALS" => Some(FailureKind::InvalidCredentials),
        "VALIDATION_ERROR" | "VALIDATION_FAILED" => Some(FailureKind::Validation),
        "CONFLICT" | "EMAIL_TAKEN" | "USER_EXISTS" => Some(FailureKind::Conflict),
        "UNAUTHORIZED" | "TOKEN_EXPIRED" | "INVALID_TOKEN" if endpoint == Endpoint::Login => {
            Some(FailureKind::InvalidCredentials)
        }
        "UNAUTHORIZED" | "TOKEN_EXPIRED" | "INVALID_TOKEN" => Some(FailureKind::Unauthorized),
        _ => None,
    }
}

fn kind_from_status(endpoint: Endpoint, status: u16) -> Option<FailureKind> {
    match status {
        400 | 422 => Some(FailureKind::Validation),
        401 if endpoint == Endpoint::Login => Some(FailureKind::InvalidCredentials),
        401 => Some(FailureKind::Unauthorized),
        408 => Some(FailureKind::Network),
        409 => Some(FailureKind::Conflict),
        _ => None,
    }
}

/// Map a non-2xx response to the most specific error `endpoint` can produce.
#[must_use]
pub fn classify_failure(endpoint: Endpoint, status: u16, body: &str) -> AuthError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code").or_else(|| v.get("error")))
        .and_then(serde_json::Value::as_str);
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| fallback_message(status, body));

    let kind = code
        .and_then(|code| kind_from_code(endpoint, code))
        .filter(|kind| endpoint.produces(*kind))
        .or_else(|| kind_from_status(endpoint, status).filter(|kind| endpoint.produces(*kind)));

    match kind {
        Some(FailureKind::InvalidCredentials) => AuthError::InvalidCredentials,
        Some(FailureKind::Validation) => AuthError::Validation(message),
        Some(FailureKind::Conflict) => AuthError::Conflict(message),
        Some(FailureKind::Unauthorized) => AuthError::Unauthorized,
        Some(FailureKind::Network) => AuthError::Network(format!("status {status}: {message}")),
        None => AuthError::Server { status: Some(status), message },
    }
}

fn fallback_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(MAX_MESSAGE_LEN).collect();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_owned()
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_auth_response(status: u16, body: &str) -> Result<AuthResponse, AuthError> {
    serde_json::from_str(body).map_err(|e| AuthError::Server {
        status: Some(status),
        message: format!("malformed auth response: {e}"),
    })
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: UserRecord,
}

fn parse_current_user(status: u16, body: &str) -> Result<UserRecord, AuthError> {
    if let Ok(envelope) = serde_json::from_str::<UserEnvelope>(body) {
        return Ok(envelope.user);
    }
    serde_json::from_str::<UserRecord>(body).map_err(|e| AuthError::Server {
        status: Some(status),
        message: format!("malformed user response: {e}"),
    })
}

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Network(format!("request timed out: {e}"))
    } else {
        AuthError::Network(e.to_string())
    }
}

fn backoff(attempt: u32) -> Duration {
    let exp = RETRY_BASE_DELAY_MS.saturating_mul(1 << attempt.saturating_sub(1).min(6));
    let jitter = rand::rng().random_range(0..RETRY_JITTER_MS);
    Duration::from_millis(exp + jitter)
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// `AuthApi` over HTTP via `reqwest`.
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpAuthApi {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClientBuild` if the TLS/HTTP stack fails to initialize.
    pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            max_retries: config.max_retries,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Send a request built by `build`, retrying transient failures on idempotent endpoints.
    async fn execute<F>(&self, endpoint: Endpoint, build: F) -> Result<(u16, String), AuthError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let attempts = if endpoint.idempotent() { self.max_retries.saturating_add(1) } else { 1 };
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(endpoint, build()).await {
                Ok(ok) => return Ok(ok),
                Err(e) if attempt < attempts && e.retryable() => {
                    let delay = backoff(attempt);
                    tracing::debug!(?endpoint, attempt, error = %e, ?delay, "retrying auth request");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::debug!(?endpoint, attempt, code = e.error_code(), "auth request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, endpoint: Endpoint, request: reqwest::RequestBuilder) -> Result<(u16, String), AuthError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_failure(endpoint, status.as_u16(), &text));
        }
        Ok((status.as_u16(), text))
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let url = self.url(Endpoint::Login);
        let (status, body) = self
            .execute(Endpoint::Login, || self.http.post(&url).json(credentials))
            .await?;
        parse_auth_response(status, &body)
    }

    async fn register(&self, fields: &RegistrationFields) -> Result<AuthResponse, AuthError> {
        let url = self.url(Endpoint::Register);
        let (status, body) = self
            .execute(Endpoint::Register, || self.http.post(&url).json(fields))
            .await?;
        parse_auth_response(status, &body)
    }

    async fn fetch_current_user(&self, token: &str) -> Result<UserRecord, AuthError> {
        let url = self.url(Endpoint::CurrentUser);
        let (status, body) = self
            .execute(Endpoint::CurrentUser, || self.http.get(&url).bearer_auth(token))
            .await?;
        parse_current_user(status, &body)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let url = self.url(Endpoint::Logout);
        self.execute(Endpoint::Logout, || self.http.post(&url).bearer_auth(token))
            .await?;
        Ok(())
    }
}
