//! Error taxonomy for the auth session subsystem.
//!
//! ERROR HANDLING
//! ==============
//! Every failure an action can produce is an `AuthError`. None of them are
//! fatal: the context degrades to `Anonymous` at worst. `user_message` is the
//! text placed in the session's `error_message`; `Display` is for logs.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Failures produced by the API client and the auth context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Login rejected by the backend.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Field validation failed, client-side or server-side.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registration collided with an existing account.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bearer token rejected (expired or revoked session).
    #[error("unauthorized")]
    Unauthorized,

    /// Transport failure, connect failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx status with no more specific mapping, or an undecodable body.
    #[error("server error (status {status:?}): {message}")]
    Server { status: Option<u16>, message: String },

    /// A login/register/restore was issued while another one is in flight.
    #[error("another authentication request is already in flight")]
    ConcurrentOperation,

    /// The call settled after a newer action changed the session generation.
    #[error("result discarded: session changed while the request was in flight")]
    Superseded,
}

impl AuthError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Validation(_) => "E_VALIDATION",
            Self::Conflict(_) => "E_CONFLICT",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::Network(_) => "E_NETWORK",
            Self::Server { .. } => "E_SERVER",
            Self::ConcurrentOperation => "E_CONCURRENT_OPERATION",
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    /// Whether an idempotent call may be re-issued after this failure.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { status: Some(429 | 502 | 503 | 504), .. })
    }

    /// Human-readable message surfaced in `Session::error_message`.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Invalid email or password.".to_owned(),
            Self::Validation(msg) if !msg.trim().is_empty() => msg.clone(),
            Self::Validation(_) => "Please check the highlighted fields.".to_owned(),
            Self::Conflict(_) => "An account with this email already exists.".to_owned(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_owned(),
            Self::Network(_) => "Unable to reach the server. Check your connection and try again.".to_owned(),
            Self::Server { .. } => "Something went wrong on our side. Please try again later.".to_owned(),
            Self::ConcurrentOperation => "Please wait for the current sign-in to finish.".to_owned(),
            Self::Superseded => "The request was cancelled.".to_owned(),
        }
    }
}

/// Failures writing or clearing the persisted session record.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures resolving `SessionConfig` from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}
