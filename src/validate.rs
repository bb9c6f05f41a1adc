//! Client-side form validation for the login and registration forms.
//!
//! Runs before any network call so obviously bad input never reaches the
//! backend. Every failing field is reported; the auth context surfaces the
//! first message.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use std::fmt;

use crate::error::AuthError;
use crate::types::{Credentials, RegistrationFields};

pub const MIN_PASSWORD_LEN: usize = 8;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collapse field errors into the single `Validation` error the context surfaces.
#[must_use]
pub fn to_auth_error(errors: &[FieldError]) -> AuthError {
    let message = errors.first().map(|e| e.message.clone()).unwrap_or_default();
    AuthError::Validation(message)
}

/// Trim, lower-case and sanity-check an email address.
///
/// # Errors
///
/// Returns a `FieldError` for `email` when the address is empty or malformed.
pub fn normalize_email(raw: &str) -> Result<String, FieldError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() {
        return Err(FieldError::new("email", "Email is required."));
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FieldError::new("email", "Enter a valid email address."));
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(FieldError::new("email", "Enter a valid email address."));
    }
    Ok(email)
}

/// Validate a login submission, returning normalised credentials.
///
/// # Errors
///
/// Returns every failing field.
pub fn validate_credentials(credentials: &Credentials) -> Result<Credentials, Vec<FieldError>> {
    let mut errors = Vec::new();
    let email = normalize_email(&credentials.email).map_err(|e| errors.push(e)).ok();
    if credentials.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required."));
    }
    match email {
        Some(email) if errors.is_empty() => Ok(Credentials { email, password: credentials.password.clone() }),
        _ => Err(errors),
    }
}

/// Validate a registration submission, returning normalised fields.
///
/// # Errors
///
/// Returns every failing field.
pub fn validate_registration(fields: &RegistrationFields) -> Result<RegistrationFields, Vec<FieldError>> {
    let mut errors = Vec::new();

    let first_name = fields.first_name.trim().to_owned();
    if first_name.is_empty() {
        errors.push(FieldError::new("firstName", "First name is required."));
    }
    let last_name = fields.last_name.trim().to_owned();
    if last_name.is_empty() {
        errors.push(FieldError::new("lastName", "Last name is required."));
    }
    let email = normalize_email(&fields.email).map_err(|e| errors.push(e)).ok();
    if fields.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    let phone = fields
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned);
    if let Some(phone) = &phone {
        if !valid_phone(phone) {
            errors.push(FieldError::new("phone", "Enter a valid phone number."));
        }
    }
    let role = fields
        .role
        .as_deref()
        .map(|r| r.trim().to_ascii_lowercase())
        .filter(|r| !r.is_empty());

    match email {
        Some(email) if errors.is_empty() => Ok(RegistrationFields {
            first_name,
            last_name,
            email,
            password: fields.password.clone(),
            phone,
            role,
        }),
        _ => Err(errors),
    }
}

fn valid_phone(phone: &str) -> bool {
    let body = phone.strip_prefix('+').unwrap_or(phone);
    if !body.chars().all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')')) {
        return false;
    }
    let digits = body.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}
