//! End-to-end sign-in through the loopback callback server.
//!
//! A wiremock authorization server issues tokens, a second wiremock server
//! plays the dashboard API, and plain reqwest stands in for the browser
//! following the redirect.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shopdesk_common::auth::{OAuthConfig, Role, SessionManager, SessionState, TokenClient};
use shopdesk_common::storage::{keys, MemorySessionStore, SessionStore};
use shopdesk_common::testing::TokenFixture;
use shopdesk_infra::config::ApiSettings;
use shopdesk_infra::{ApiClient, ApiError, CallbackServer};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    auth_server: MockServer,
    api_server: MockServer,
    callback: CallbackServer,
    manager: SessionManager<TokenClient, MemorySessionStore>,
}

async fn harness() -> Harness {
    let auth_server = MockServer::start().await;
    let api_server = MockServer::start().await;
    let callback = CallbackServer::bind("http://127.0.0.1:0/callback").await.expect("bind");

    let config = OAuthConfig::new(
        auth_server.uri(),
        "admin-dashboard",
        callback.redirect_uri().as_str(),
        vec!["openid".to_string(), "profile".to_string()],
    )
    .with_request_timeout(Duration::from_secs(5));
    let client = TokenClient::from_config(&config).expect("token client");
    let manager = SessionManager::new(config, client, Arc::new(MemorySessionStore::new()));

    Harness { auth_server, api_server, callback, manager }
}

/// Follow the authorize URL the way the authorization server would: straight
/// back to the redirect URI with a code and the echoed state.
async fn browser_redirect(authorize_url: &str, code: &str) {
    let authorize = Url::parse(authorize_url).expect("authorize url");
    let mut redirect_uri = None;
    let mut state = None;
    for (k, v) in authorize.query_pairs() {
        match k.as_ref() {
            "redirect_uri" => redirect_uri = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            _ => {}
        }
    }

    let mut callback = Url::parse(&redirect_uri.expect("redirect_uri param")).expect("redirect");
    callback
        .query_pairs_mut()
        .append_pair("code", code)
        .append_pair("state", &state.expect("state param"));
    let response = reqwest::get(callback).await.expect("callback request");
    assert!(response.status().is_success());
}

/// Validates the loopback sign-in behavior for the admin login scenario.
///
/// Assertions:
/// - Confirms the code captured by the loopback server is exchanged.
/// - Confirms the session ends `Authenticated` with the admin role.
/// - Confirms the API client sends the issued bearer token.
#[tokio::test]
async fn test_loopback_login_then_authenticated_api_call() {
    let mut h = harness().await;
    let access_token = TokenFixture::new("u-1").username("ada").roles(&["ADMIN"]).build();

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=loopback-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1"
        })))
        .expect(1)
        .mount(&h.auth_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", format!("Bearer {access_token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&h.api_server)
        .await;

    let request = h.manager.start_authorization_flow().expect("start");
    assert_eq!(h.manager.state(), SessionState::AuthorizationPending);

    browser_redirect(&request.url, "loopback-code").await;
    let params = h.callback.wait_for_callback(Duration::from_secs(5)).await.expect("callback");

    let user = h.manager.handle_authorization_callback(&params).await.expect("login");
    assert_eq!(user.username, "ada");
    assert_eq!(user.role, Role::Admin);
    assert_eq!(h.manager.state(), SessionState::Authenticated);

    let settings =
        ApiSettings { base_url: format!("{}/api", h.api_server.uri()), timeout_secs: 5 };
    let api = ApiClient::new(&settings, h.manager.authenticator().expect("authenticator"))
        .expect("api client");
    let orders: serde_json::Value = api.get("orders").await.expect("orders");
    assert_eq!(orders[0]["id"], 1);

    h.callback.shutdown().await.expect("shutdown");
}

/// Validates the API client behavior for the signed-out scenario.
///
/// Assertions:
/// - Confirms a logout stops bearer injection on the very next call.
/// - Confirms the resulting 401 reports that a new sign-in is needed.
#[tokio::test]
async fn test_api_call_after_logout_is_unauthorized() {
    let h = harness().await;
    h.manager.store().set(keys::ACCESS_TOKEN, &TokenFixture::new("u-2").build()).expect("seed");
    h.manager.restore().expect("restore");
    assert!(h.manager.is_authenticated());

    Mock::given(path("/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.api_server)
        .await;

    let api = ApiClient::new(
        &ApiSettings { base_url: format!("{}/api", h.api_server.uri()), timeout_secs: 5 },
        h.manager.authenticator().expect("authenticator"),
    )
    .expect("api client");

    h.manager.logout();
    let err = api.get::<serde_json::Value>("me").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }));
    assert!(err.requires_login());

    let requests = h.api_server.received_requests().await.expect("recording enabled");
    assert!(requests.iter().all(|r| !r.headers.contains_key("authorization")));
}

/// Validates the callback behavior for the user-denied scenario.
///
/// Assertions:
/// - Confirms an `error` redirect fails the flow and clears the session.
#[tokio::test]
async fn test_denied_consent_clears_session() {
    let mut h = harness().await;
    let _request = h.manager.start_authorization_flow().expect("start");

    let mut denied = h.callback.redirect_uri().clone();
    denied.query_pairs_mut().append_pair("error", "access_denied");
    reqwest::get(denied).await.expect("callback request");

    let params = h.callback.wait_for_callback(Duration::from_secs(5)).await.expect("callback");
    let err = h.manager.handle_authorization_callback(&params).await.unwrap_err();
    assert!(err.to_string().contains("access_denied"));
    assert_eq!(h.manager.state(), SessionState::Anonymous);
    assert_eq!(h.manager.store().get(keys::OAUTH_STATE).expect("read"), None);
}
