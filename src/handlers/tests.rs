//! # Tests for Handlers
//!
//! Router-level tests that need no upstream: validation, session checks,
//! fallback and the callback's redirect-only contract.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::models::{Platform, SecretToken, Session, TokenBundle};
use crate::server::{AppState, create_app};
use crate::session::{InMemorySessionStore, SessionStore};

fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        google_client_id: Some("test-client".to_string()),
        google_client_secret: Some("test-secret".to_string()),
        ..AppConfig::default()
    }
}

fn test_app() -> (Router, Arc<dyn SessionStore>) {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::default());
    let state = AppState::with_store(test_config(), store.clone()).unwrap();
    (create_app(state).unwrap(), store)
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn insert_authenticated(store: &dyn SessionStore, session_id: &str, expires_in: Duration) {
    store
        .create(Session::pending(
            session_id,
            Platform::Web,
            SecretToken::new("nonce"),
            Utc::now(),
        ))
        .await
        .unwrap();
    store
        .authenticate(
            session_id,
            "nonce",
            TokenBundle {
                access_token: SecretToken::new("access"),
                refresh_token: None,
                token_type: Some("Bearer".to_string()),
                scope: None,
            },
            Some(Utc::now() + expires_in),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_root_returns_service_info() {
    let (app, _) = test_app();
    let response = get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], "picker-proxy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_reports_ok() {
    let (app, _) = test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_route_echoes_path() {
    let (app, _) = test_app();
    let response = get(app, "/api/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );
    let body = json_body(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["details"]["path"], "/api/nope");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_oauth_url_defaults_to_web_and_creates_pending_session() {
    let (app, store) = test_app();
    let response = get(app.clone(), "/api/oauth/url").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    let oauth_url = body["oauthUrl"].as_str().unwrap();
    assert!(oauth_url.contains("client_id=test-client"));
    assert!(oauth_url.contains("state="));

    let session = store.get(&session_id).await.unwrap();
    assert_eq!(session.platform, Platform::Web);
    assert!(!session.is_authenticated());

    let verify = get(app, &format!("/api/oauth/verify?sessionId={session_id}")).await;
    assert_eq!(json_body(verify).await["authenticated"], false);
}

#[tokio::test]
async fn test_oauth_url_rejects_unknown_platform() {
    let (app, store) = test_app();
    let response = get(app, "/api/oauth/url?platform=symbian").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_callback_without_parameters_redirects() {
    let (app, _) = test_app();
    let response = get(app, "/api/oauth/callback").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:8081/oauth-callback?error=missing_parameters"
    );
}

#[tokio::test]
async fn test_verify_without_session_is_false() {
    let (app, _) = test_app();
    let response = get(app, "/api/oauth/verify").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["authenticated"], false);
}

#[tokio::test]
async fn test_verify_reports_authenticated_session() {
    let (app, store) = test_app();
    insert_authenticated(store.as_ref(), "s-auth", Duration::hours(1)).await;

    let response = get(app, "/api/oauth/verify?sessionId=s-auth").await;
    assert_eq!(json_body(response).await["authenticated"], true);
}

#[tokio::test]
async fn test_picker_session_requires_session_id() {
    let (app, _) = test_app();
    let response = get(app, "/api/picker/session").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "SESSION_REQUIRED");
}

#[tokio::test]
async fn test_picker_session_rejects_unknown_session() {
    let (app, _) = test_app();
    let response = get(app, "/api/picker/session?sessionId=missing").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_picker_session_rejects_expired_token() {
    let (app, store) = test_app();
    insert_authenticated(store.as_ref(), "s-old", Duration::seconds(-5)).await;

    let response = get(app, "/api/picker/session?sessionId=s-old").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_poll_requires_picker_session_id() {
    let (app, store) = test_app();
    insert_authenticated(store.as_ref(), "s-1", Duration::hours(1)).await;

    let response = get(app, "/api/picker/poll?sessionId=s-1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_drive_list_rejects_out_of_range_page_size() {
    let (app, store) = test_app();
    insert_authenticated(store.as_ref(), "s-1", Duration::hours(1)).await;

    let response = get(app, "/api/drive/files?sessionId=s-1&pageSize=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_image_proxy_rejects_foreign_host() {
    let (app, store) = test_app();
    insert_authenticated(store.as_ref(), "s-1", Duration::hours(1)).await;

    let encoded = base64_url::encode("https://evil.example.com/steal");
    let response = get(app, &format!("/api/picker/image/s-1/{encoded}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = test_app();
    let response = get(app, "/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/picker/result"].is_object());
    assert!(body["paths"]["/api/drive/files/{fileId}/download"].is_object());
}
