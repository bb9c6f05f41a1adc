use super::*;

const LOGIN: &str = "/auth/login";

// =============================================================
// decide
// =============================================================

#[test]
fn public_routes_always_render() {
    for status in [
        SessionStatus::Anonymous,
        SessionStatus::Authenticating,
        SessionStatus::Authenticated,
        SessionStatus::Error,
    ] {
        assert_eq!(decide(RouteRequirement::Public, status, "/services", LOGIN), GuardDecision::Render);
    }
}

#[test]
fn protected_route_renders_when_authenticated() {
    let decision = decide(RouteRequirement::RequiresAuth, SessionStatus::Authenticated, "/bookings", LOGIN);
    assert_eq!(decision, GuardDecision::Render);
}

#[test]
fn protected_route_waits_while_authenticating() {
    let decision = decide(RouteRequirement::RequiresAuth, SessionStatus::Authenticating, "/bookings", LOGIN);
    assert_eq!(decision, GuardDecision::Loading);
}

#[test]
fn anonymous_is_redirected_with_original_path() {
    let decision = decide(RouteRequirement::RequiresAuth, SessionStatus::Anonymous, "/bookings", LOGIN);
    assert_eq!(decision, GuardDecision::Redirect { to: "/auth/login?redirect=%2Fbookings".to_owned() });
}

#[test]
fn error_state_is_redirected() {
    let decision = decide(RouteRequirement::RequiresAuth, SessionStatus::Error, "/pets", LOGIN);
    assert!(matches!(decision, GuardDecision::Redirect { .. }));
}

#[test]
fn custom_login_path_is_used() {
    let decision = decide(RouteRequirement::RequiresAuth, SessionStatus::Anonymous, "/dashboard", "/login");
    assert_eq!(decision, GuardDecision::Redirect { to: "/login?redirect=%2Fdashboard".to_owned() });
}

// =============================================================
// login_redirect
// =============================================================

#[test]
fn query_in_requested_path_is_encoded() {
    let url = login_redirect(LOGIN, "/bookings?id=3&tab=past");
    assert_eq!(url, "/auth/login?redirect=%2Fbookings%3Fid%3D3%26tab%3Dpast");
}

#[test]
fn unsafe_requested_path_drops_redirect() {
    assert_eq!(login_redirect(LOGIN, "https://evil.test/"), LOGIN);
    assert_eq!(login_redirect(LOGIN, "//evil.test"), LOGIN);
    assert_eq!(login_redirect(LOGIN, "/auth/login"), LOGIN);
}

// =============================================================
// round trip through the login page
// =============================================================

#[test]
fn redirect_round_trips_to_original_path() {
    let url = login_redirect(LOGIN, "/bookings?id=3&tab=past");
    let param = redirect_param_from(&url);
    assert_eq!(post_login_target(param.as_deref(), LOGIN), "/bookings?id=3&tab=past");
}

#[test]
fn redirect_param_is_found_among_others() {
    let param = redirect_param_from("/auth/login?lang=en&redirect=%2Fpets#top");
    assert_eq!(param.as_deref(), Some("%2Fpets"));
}

#[test]
fn redirect_param_missing() {
    assert_eq!(redirect_param_from("/auth/login"), None);
    assert_eq!(redirect_param_from("/auth/login?lang=en"), None);
}

// =============================================================
// post_login_target
// =============================================================

#[test]
fn missing_redirect_goes_home() {
    assert_eq!(post_login_target(None, LOGIN), "/");
}

#[test]
fn plain_paths_are_accepted_unencoded() {
    assert_eq!(post_login_target(Some("/profile"), LOGIN), "/profile");
}

#[test]
fn off_site_targets_go_home() {
    for raw in ["https%3A%2F%2Fevil.test", "%2F%2Fevil.test", "%2F%5Cevil.test", "javascript:alert(1)", "%2Fok%0Aevil"] {
        assert_eq!(post_login_target(Some(raw), LOGIN), "/", "expected {raw:?} to be rejected");
    }
}

#[test]
fn login_page_is_never_a_target() {
    assert_eq!(post_login_target(Some("%2Fauth%2Flogin%3Fredirect%3D%252F"), LOGIN), "/");
    assert_eq!(post_login_target(Some("/auth/login/"), LOGIN), "/");
}

#[test]
fn plus_decodes_to_space() {
    assert_eq!(post_login_target(Some("%2Fsearch%3Fq%3Ddog+walker"), LOGIN), "/search?q=dog walker");
}
