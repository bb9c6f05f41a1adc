//! Route guarding against the current session status.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every page declares a `RouteRequirement`. Pages apply identical
//! unauthenticated-redirect behavior through `decide`, and the login page
//! reads its `redirect` parameter back through `post_login_target`.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::types::SessionStatus;

pub const REDIRECT_PARAM: &str = "redirect";
const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    Public,
    RequiresAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    /// Session is still being validated; show a neutral placeholder.
    Loading,
    Redirect { to: String },
}

/// Decide whether `requested_path` may render for `status`.
#[must_use]
pub fn decide(requirement: RouteRequirement, status: SessionStatus, requested_path: &str, login_path: &str) -> GuardDecision {
    match (requirement, status) {
        (RouteRequirement::Public, _) | (RouteRequirement::RequiresAuth, SessionStatus::Authenticated) => {
            GuardDecision::Render
        }
        (RouteRequirement::RequiresAuth, SessionStatus::Authenticating) => GuardDecision::Loading,
        (RouteRequirement::RequiresAuth, SessionStatus::Anonymous | SessionStatus::Error) => {
            GuardDecision::Redirect { to: login_redirect(login_path, requested_path) }
        }
    }
}

/// Login URL that returns to `requested_path` after sign-in.
#[must_use]
pub fn login_redirect(login_path: &str, requested_path: &str) -> String {
    if !is_safe_target(requested_path, login_path) {
        return login_path.to_owned();
    }
    format!("{login_path}?{REDIRECT_PARAM}={}", urlencoding::encode(requested_path))
}

/// Raw `redirect` parameter of a login URL such as `/auth/login?redirect=%2Fbookings`.
#[must_use]
pub fn redirect_param_from(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == REDIRECT_PARAM)
        .map(|(_, value)| value.to_owned())
}

/// Where to send the user after a successful login.
///
/// Only same-origin absolute paths are honored; anything else goes home.
#[must_use]
pub fn post_login_target(redirect_param: Option<&str>, login_path: &str) -> String {
    redirect_param
        .map(|raw| raw.replace('+', " "))
        .and_then(|raw| urlencoding::decode(&raw).ok().map(|decoded| decoded.into_owned()))
        .filter(|target| is_safe_target(target, login_path))
        .unwrap_or_else(|| HOME_PATH.to_owned())
}

fn is_safe_target(target: &str, login_path: &str) -> bool {
    if !target.starts_with('/') || target.starts_with("//") || target.contains('\\') {
        return false;
    }
    if target.chars().any(char::is_control) {
        return false;
    }
    let path = target.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/') != login_path.trim_end_matches('/')
}
