use super::*;

#[test]
fn error_codes_are_stable() {
    assert_eq!(AuthError::InvalidCredentials.error_code(), "E_INVALID_CREDENTIALS");
    assert_eq!(AuthError::Unauthorized.error_code(), "E_UNAUTHORIZED");
    assert_eq!(AuthError::ConcurrentOperation.error_code(), "E_CONCURRENT_OPERATION");
    assert_eq!(
        AuthError::Server { status: Some(500), message: String::new() }.error_code(),
        "E_SERVER"
    );
}

#[test]
fn network_errors_are_retryable() {
    assert!(AuthError::Network("timed out".into()).retryable());
}

#[test]
fn transient_server_statuses_are_retryable() {
    for status in [429, 502, 503, 504] {
        let err = AuthError::Server { status: Some(status), message: String::new() };
        assert!(err.retryable(), "expected {status} to be retryable");
    }
}

#[test]
fn terminal_errors_are_not_retryable() {
    assert!(!AuthError::InvalidCredentials.retryable());
    assert!(!AuthError::Conflict("taken".into()).retryable());
    assert!(!AuthError::Unauthorized.retryable());
    assert!(!AuthError::Server { status: Some(500), message: String::new() }.retryable());
    assert!(!AuthError::Server { status: None, message: String::new() }.retryable());
}

#[test]
fn user_messages_are_never_empty() {
    let all = [
        AuthError::InvalidCredentials,
        AuthError::Validation(String::new()),
        AuthError::Conflict(String::new()),
        AuthError::Unauthorized,
        AuthError::Network(String::new()),
        AuthError::Server { status: None, message: String::new() },
        AuthError::ConcurrentOperation,
        AuthError::Superseded,
    ];
    for err in all {
        assert!(!err.user_message().trim().is_empty(), "empty message for {err:?}");
    }
}

#[test]
fn validation_message_passes_through() {
    let err = AuthError::Validation("Email is required.".into());
    assert_eq!(err.user_message(), "Email is required.");
}

#[test]
fn display_includes_server_status() {
    let err = AuthError::Server { status: Some(503), message: "maintenance".into() };
    let text = err.to_string();
    assert!(text.contains("503"));
    assert!(text.contains("maintenance"));
}
