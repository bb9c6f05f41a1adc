use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn from_lookup_defaults() {
    let cfg = SessionConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, SessionConfig::default());
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.request_timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    assert_eq!(cfg.login_path, "/auth/login");
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = SessionConfig::from_lookup(lookup_from(&[
        ("PAWCARE_API_BASE_URL", "https://api.pawcare.test/v1/"),
        ("PAWCARE_REQUEST_TIMEOUT_SECS", "30"),
        ("PAWCARE_CONNECT_TIMEOUT_SECS", "3"),
        ("PAWCARE_MAX_RETRIES", "0"),
        ("PAWCARE_SESSION_DIR", "/tmp/pawcare-admin"),
        ("PAWCARE_SESSION_KEY", "pawcare.admin.session"),
        ("PAWCARE_LOGIN_PATH", "/login"),
    ]))
    .unwrap();
    assert_eq!(cfg.api_base_url, "https://api.pawcare.test/v1");
    assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
    assert_eq!(cfg.max_retries, 0);
    assert_eq!(cfg.session_dir, PathBuf::from("/tmp/pawcare-admin"));
    assert_eq!(cfg.session_key, "pawcare.admin.session");
    assert_eq!(cfg.login_path, "/login");
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let cfg = SessionConfig::from_lookup(lookup_from(&[("PAWCARE_MAX_RETRIES", "   ")])).unwrap();
    assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
}

#[test]
fn invalid_number_errors() {
    let err = SessionConfig::from_lookup(lookup_from(&[("PAWCARE_REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue { var: "PAWCARE_REQUEST_TIMEOUT_SECS", value: "soon".to_owned() }
    );
}

#[test]
fn non_http_base_url_errors() {
    let err = SessionConfig::from_lookup(lookup_from(&[("PAWCARE_API_BASE_URL", "ftp://files.test")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
}

#[test]
fn relative_login_path_errors() {
    let err = SessionConfig::from_lookup(lookup_from(&[("PAWCARE_LOGIN_PATH", "login")])).unwrap_err();
    assert!(err.to_string().contains("PAWCARE_LOGIN_PATH"));
}

#[test]
fn normalize_base_url_strips_trailing_slashes() {
    assert_eq!(normalize_base_url("http://localhost:5000//").unwrap(), "http://localhost:5000");
}
