//! Runtime configuration parsed from environment variables.
//!
//! All variables are optional:
//! - `PAWCARE_API_BASE_URL`: backend root, default `http://127.0.0.1:5000/api`
//! - `PAWCARE_REQUEST_TIMEOUT_SECS`: default 15
//! - `PAWCARE_CONNECT_TIMEOUT_SECS`: default 5
//! - `PAWCARE_MAX_RETRIES`: retries for idempotent calls, default 2
//! - `PAWCARE_SESSION_DIR`: directory holding the session record, default `.pawcare`
//! - `PAWCARE_SESSION_KEY`: storage key of the session record, default `pawcare.session`
//! - `PAWCARE_LOGIN_PATH`: login route used by the guard, default `/auth/login`

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_SESSION_DIR: &str = ".pawcare";
pub const DEFAULT_SESSION_KEY: &str = "pawcare.session";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend root without a trailing slash.
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub session_dir: PathBuf,
    pub session_key: String,
    pub login_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            session_key: DEFAULT_SESSION_KEY.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
        }
    }
}

impl SessionConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_base_url = match get("PAWCARE_API_BASE_URL") {
            Some(raw) => normalize_base_url(&raw)?,
            None => defaults.api_base_url,
        };
        let request_timeout = Duration::from_secs(parse_or(
            "PAWCARE_REQUEST_TIMEOUT_SECS",
            get("PAWCARE_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let connect_timeout = Duration::from_secs(parse_or(
            "PAWCARE_CONNECT_TIMEOUT_SECS",
            get("PAWCARE_CONNECT_TIMEOUT_SECS"),
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?);
        let max_retries = parse_or("PAWCARE_MAX_RETRIES", get("PAWCARE_MAX_RETRIES"), DEFAULT_MAX_RETRIES)?;
        let session_dir = get("PAWCARE_SESSION_DIR").map_or(defaults.session_dir, PathBuf::from);
        let session_key = get("PAWCARE_SESSION_KEY").unwrap_or(defaults.session_key);
        let login_path = match get("PAWCARE_LOGIN_PATH") {
            Some(path) if path.starts_with('/') => path,
            Some(path) => return Err(ConfigError::InvalidValue { var: "PAWCARE_LOGIN_PATH", value: path }),
            None => defaults.login_path,
        };

        Ok(Self { api_base_url, request_timeout, connect_timeout, max_retries, session_dir, session_key, login_path })
    }
}

/// Validate an http(s) base URL and strip trailing slashes.
///
/// # Errors
///
/// Returns `ConfigError::InvalidBaseUrl` for unparseable or non-http URLs.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(format!("{raw}: unsupported scheme")));
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

fn parse_or<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}
