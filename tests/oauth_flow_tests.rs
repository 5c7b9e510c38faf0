//! End-to-end OAuth flow against a mocked Google token endpoint.

mod test_utils;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde_json::{Value, json};
use test_utils::{TestApp, spawn_app};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct IssuedUrl {
    session_id: String,
    state: String,
    oauth_url: Url,
}

async fn issue_url(app: &TestApp, platform: &str) -> IssuedUrl {
    let response = app.get(&format!("/api/oauth/url?platform={platform}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    let oauth_url = Url::parse(body["oauthUrl"].as_str().unwrap()).unwrap();
    let state = oauth_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    IssuedUrl {
        session_id: body["sessionId"].as_str().unwrap().to_string(),
        state,
        oauth_url,
    }
}

async fn callback(app: &TestApp, query: &[(&str, &str)]) -> String {
    let response = app
        .http
        .get(app.url("/api/oauth/callback"))
        .query(query)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()["location"].to_str().unwrap().to_string()
}

async fn verify(app: &TestApp, session_id: &str) -> bool {
    let body: Value = app
        .get(&format!("/api/oauth/verify?sessionId={session_id}"))
        .await
        .json()
        .await
        .unwrap();
    body["authenticated"].as_bool().unwrap()
}

async fn mount_token_endpoint(upstream: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "scope": "https://www.googleapis.com/auth/photospicker.mediaitems.readonly"
        })))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn web_sign_in_authenticates_session_and_unlocks_picker() {
    let upstream = MockServer::start().await;
    mount_token_endpoint(&upstream, "tok123").await;
    Mock::given(method("POST"))
        .and(path("/photos/v1/sessions"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "picker-1",
            "pickerUri": "https://photos.google.com/picker/picker-1",
            "pollingConfig": {"pollInterval": "5s", "timeoutIn": "1800s"},
            "mediaItemsSet": false
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "web").await;

    let pairs: Vec<(String, String)> = issued
        .oauth_url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let param = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(param("response_type"), Some("code"));
    assert_eq!(param("client_id"), Some("test-client-id"));
    assert_eq!(param("access_type"), Some("offline"));
    assert_eq!(param("prompt"), Some("consent"));
    assert_eq!(
        param("redirect_uri"),
        Some(app.config.oauth.redirect_uri.as_str())
    );

    // The state blob is standard base64 JSON naming the session and platform.
    let decoded: Value = serde_json::from_slice(&STANDARD.decode(&issued.state).unwrap()).unwrap();
    assert_eq!(decoded["sessionId"], issued.session_id.as_str());
    assert_eq!(decoded["platform"], "web");

    assert!(!verify(&app, &issued.session_id).await);

    let location = callback(&app, &[("code", "auth-code"), ("state", &issued.state)]).await;
    assert_eq!(
        location,
        format!(
            "http://localhost:8081/oauth-callback?sessionId={}&success=true",
            issued.session_id
        )
    );
    assert!(verify(&app, &issued.session_id).await);

    let response = app
        .get(&format!("/api/picker/session?sessionId={}", issued.session_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pickerUri"], "https://photos.google.com/picker/picker-1");
    assert_eq!(body["sessionId"], "picker-1");
    assert_eq!(body["pickerSessionId"], "picker-1");
}

#[tokio::test]
async fn mobile_sign_in_redirects_to_deep_link() {
    let upstream = MockServer::start().await;
    mount_token_endpoint(&upstream, "tok-mobile").await;

    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "android").await;

    let location = callback(&app, &[("code", "auth-code"), ("state", &issued.state)]).await;
    assert_eq!(
        location,
        format!(
            "mediapicker://oauth-callback?sessionId={}&success=true",
            issued.session_id
        )
    );
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
    let upstream = MockServer::start().await;
    mount_token_endpoint(&upstream, "tok123").await;

    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "web").await;

    callback(&app, &[("code", "auth-code"), ("state", &issued.state)]).await;
    let replay = callback(&app, &[("code", "auth-code"), ("state", &issued.state)]).await;

    assert_eq!(
        replay,
        "http://localhost:8081/oauth-callback?error=invalid_state"
    );
    assert!(verify(&app, &issued.session_id).await);
}

#[tokio::test]
async fn forged_state_does_not_authenticate() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "stolen",
            "token_type": "Bearer"
        })))
        .expect(0)
        .mount(&upstream)
        .await;

    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "web").await;

    let forged = STANDARD.encode(
        json!({
            "sessionId": issued.session_id,
            "platform": "web",
            "nonce": "guessed"
        })
        .to_string(),
    );
    let location = callback(&app, &[("code", "auth-code"), ("state", &forged)]).await;
    assert_eq!(
        location,
        "http://localhost:8081/oauth-callback?error=invalid_state"
    );

    // A state for a session the server never issued fares no better.
    let unknown = STANDARD.encode(
        json!({"sessionId": "made-up", "platform": "ios", "nonce": "x"}).to_string(),
    );
    let location = callback(&app, &[("code", "auth-code"), ("state", &unknown)]).await;
    assert_eq!(location, "mediapicker://oauth-callback?error=invalid_state");

    assert!(!verify(&app, &issued.session_id).await);
    assert!(!verify(&app, "made-up").await);
}

#[tokio::test]
async fn missing_parameters_redirect_to_web() {
    let upstream = MockServer::start().await;
    let app = spawn_app(&upstream).await;

    let location = callback(&app, &[("code", "auth-code")]).await;
    assert_eq!(
        location,
        "http://localhost:8081/oauth-callback?error=missing_parameters"
    );
}

#[tokio::test]
async fn provider_error_discards_pending_session() {
    let upstream = MockServer::start().await;
    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "ios").await;

    let location = callback(
        &app,
        &[("error", "access_denied"), ("state", &issued.state)],
    )
    .await;
    assert_eq!(location, "mediapicker://oauth-callback?error=access_denied");
    assert!(app.store.get(&issued.session_id).await.is_none());
}

#[tokio::test]
async fn failed_exchange_redirects_with_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&upstream)
        .await;

    let app = spawn_app(&upstream).await;
    let issued = issue_url(&app, "web").await;

    let location = callback(&app, &[("code", "auth-code"), ("state", &issued.state)]).await;
    assert_eq!(
        location,
        "http://localhost:8081/oauth-callback?error=token_exchange_failed"
    );
    assert!(!verify(&app, &issued.session_id).await);
    assert!(app.store.get(&issued.session_id).await.is_none());
}
