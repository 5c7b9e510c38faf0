//! # Server Configuration
//!
//! Router, middleware stack and process lifecycle for the picker proxy.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::error::{ApiError, ErrorType};
use crate::google::{DriveClient, PhotosPickerClient, build_http_client};
use crate::handlers;
use crate::oauth::{GoogleOAuthClient, OAuthExchange, RedirectTargets};
use crate::proxy::{DriveProxy, PickerProxy};
use crate::session::{InMemorySessionStore, SessionStore, SessionSweeper};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub oauth: Arc<OAuthExchange>,
    pub picker: Arc<PickerProxy>,
    pub drive: Arc<DriveProxy>,
}

impl AppState {
    /// Wire every service from configuration around an in-memory session store.
    pub fn from_config(config: AppConfig) -> Result<Self, reqwest::Error> {
        let sessions: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.sessions.idle_ttl()));
        Self::with_store(config, sessions)
    }

    /// Wire every service around the given session store.
    pub fn with_store(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, reqwest::Error> {
        let http = build_http_client(config.upstream.timeout())?;

        let oauth = OAuthExchange::new(
            sessions.clone(),
            GoogleOAuthClient::new(http.clone(), &config),
            RedirectTargets::from_config(&config.oauth),
        );
        let picker = PickerProxy::new(
            sessions.clone(),
            PhotosPickerClient::new(http.clone(), &config.upstream.photos_picker_api_base),
            &config.upstream,
        );
        let drive = DriveProxy::new(
            sessions.clone(),
            DriveClient::new(http, &config.upstream.drive_api_base),
        );

        Ok(Self {
            config: Arc::new(config),
            sessions,
            oauth: Arc::new(oauth),
            picker: Arc::new(picker),
            drive: Arc::new(drive),
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Result<Router, InvalidHeaderValue> {
    let cors = build_cors_layer(&state.config.cors_allowed_origins)?;

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/oauth/url", get(handlers::oauth::oauth_url))
        .route("/api/oauth/callback", get(handlers::oauth::oauth_callback))
        .route("/api/oauth/verify", get(handlers::oauth::verify))
        .route("/api/picker/session", get(handlers::picker::create_session))
        .route("/api/picker/poll", get(handlers::picker::poll))
        .route("/api/picker/result", get(handlers::picker::result))
        .route(
            "/api/picker/image/{session_id}/{image_url}",
            get(handlers::picker::image),
        )
        .route("/api/drive/files", get(handlers::drive::list_files))
        .route("/api/drive/files/{file_id}", get(handlers::drive::get_file))
        .route(
            "/api/drive/files/{file_id}/download",
            get(handlers::drive::download_file),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(telemetry::trace_id_middleware))
                .layer(CatchPanicLayer::custom(handle_panic)),
        );

    Ok(router)
}

/// Build the CORS layer restricted to the configured origins.
fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600)))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Request handler panicked");

    ApiError::from(ErrorType::InternalServerError).into_response()
}

/// Resolves once Ctrl-C or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let sweep_interval = config.sessions.sweep_interval();
    let profile = config.profile.clone();

    let state = AppState::from_config(config)?;
    let sweeper = SessionSweeper::new(state.sessions.clone(), sweep_interval);
    let app = create_app(state)?;

    let shutdown = CancellationToken::new();
    let sweeper_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sweeper.run(shutdown).await })
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped accepting connections");
    shutdown.cancel();
    if let Err(err) = sweeper_handle.await {
        error!(error = %err, "Session sweeper task failed");
    }

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::oauth::oauth_url,
        crate::handlers::oauth::oauth_callback,
        crate::handlers::oauth::verify,
        crate::handlers::picker::create_session,
        crate::handlers::picker::poll,
        crate::handlers::picker::result,
        crate::handlers::picker::image,
        crate::handlers::drive::list_files,
        crate::handlers::drive::get_file,
        crate::handlers::drive::download_file,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::HealthResponse,
            crate::models::OAuthUrlResponse,
            crate::models::VerifyResponse,
            crate::models::PickerSessionResponse,
            crate::models::PickerPollResponse,
            crate::models::MediaItemsResponse,
            crate::models::MediaItem,
            crate::models::DriveFileList,
            crate::models::DriveFile,
            crate::error::ApiError,
            crate::error::ProviderError,
        )
    ),
    info(
        title = "Picker Proxy API",
        description = "OAuth session broker and proxy for the Google Photos Picker and Drive APIs",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
