use std::time::Duration;

use http::HeaderMap;
use http::header;
use twolane_auth::{AuthConfig, Principal, TokenAuthenticator};

fn authenticator() -> TokenAuthenticator {
    TokenAuthenticator::new(AuthConfig {
        jwt_secret: "twolane-test-secret-0123456789abcdef".to_string(),
        token_ttl: Duration::from_secs(600),
        clock_skew: Duration::from_secs(0),
    })
    .expect("auth init should succeed")
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token)
            .parse()
            .expect("authorization header must parse"),
    );
    headers
}

#[test]
fn authenticate_extracts_principal_from_issued_token() {
    let auth = authenticator();
    let token = auth
        .issue(&Principal::new("u1", false))
        .expect("token issue should succeed");

    let principal = auth
        .authenticate(&bearer(&token))
        .expect("principal should be resolved");

    assert_eq!(principal.username, "u1");
    assert!(!principal.is_admin);
}

#[test]
fn authenticate_treats_missing_and_bad_tokens_as_anonymous() {
    let auth = authenticator();

    assert_eq!(auth.authenticate(&HeaderMap::new()), None);
    assert_eq!(auth.authenticate(&bearer("not.a.jwt")), None);

    let mut tampered = auth
        .issue(&Principal::new("u1", false))
        .expect("token issue should succeed");
    tampered.push('x');
    assert_eq!(auth.authenticate(&bearer(&tampered)), None);
}

#[test]
fn each_request_is_resolved_from_its_own_headers() {
    let auth = authenticator();
    let admin = auth
        .issue(&Principal::new("admin1", true))
        .expect("token issue should succeed");
    let user = auth
        .issue(&Principal::new("u2", false))
        .expect("token issue should succeed");

    assert_eq!(
        auth.authenticate(&bearer(&admin)),
        Some(Principal::new("admin1", true))
    );
    assert_eq!(
        auth.authenticate(&bearer(&user)),
        Some(Principal::new("u2", false))
    );
}
