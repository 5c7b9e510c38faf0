//! Test utilities for integration tests.
//!
//! Spawns the full router on an ephemeral port with every Google endpoint
//! pointed at a `wiremock` server.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use picker_proxy::config::AppConfig;
use picker_proxy::models::{Platform, SecretToken, Session, TokenBundle};
use picker_proxy::server::{AppState, create_app};
use picker_proxy::session::{InMemorySessionStore, SessionStore};
use tokio::net::TcpListener;
use wiremock::MockServer;

pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

pub struct TestApp {
    pub base_url: String,
    pub store: Arc<dyn SessionStore>,
    pub http: reqwest::Client,
    pub config: AppConfig,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(self.url(path)).send().await.unwrap()
    }
}

/// Configuration whose upstreams all live on `upstream`.
pub fn test_config(upstream: &MockServer, public_base_url: &str) -> AppConfig {
    let mock = upstream.uri();
    let mut config = AppConfig {
        profile: "test".to_string(),
        google_client_id: Some("test-client-id".to_string()),
        google_client_secret: Some("test-client-secret".to_string()),
        ..AppConfig::default()
    };
    config.oauth.auth_url = format!("{mock}/o/oauth2/v2/auth");
    config.oauth.token_url = format!("{mock}/token");
    config.oauth.redirect_uri = format!("{public_base_url}/api/oauth/callback");
    config.oauth.frontend_url = "http://localhost:8081".to_string();
    config.oauth.app_scheme = "mediapicker".to_string();
    config.upstream.photos_picker_api_base = format!("{mock}/photos/v1");
    config.upstream.drive_api_base = format!("{mock}/drive/v3");
    config.upstream.public_base_url = public_base_url.to_string();
    config.upstream.media_host_allowlist = vec!["127.0.0.1".to_string()];
    config.upstream.timeout_seconds = 2;
    config
}

pub async fn spawn_app(upstream: &MockServer) -> TestApp {
    spawn_app_with(upstream, |_| {}).await
}

pub async fn spawn_app_with(upstream: &MockServer, customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let mut config = test_config(upstream, &base_url);
    customize(&mut config);

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
        config.sessions.idle_ttl(),
    ));
    let state = AppState::with_store(config.clone(), store.clone()).unwrap();
    let app = create_app(state).unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        base_url,
        store,
        http,
        config,
    }
}

/// Insert a session that is already authenticated with [`TEST_ACCESS_TOKEN`].
pub async fn authenticated_session(store: &dyn SessionStore, session_id: &str) {
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
                access_token: SecretToken::new(TEST_ACCESS_TOKEN),
                refresh_token: None,
                token_type: Some("Bearer".to_string()),
                scope: None,
            },
            Some(Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();
}
