//! # OAuth Handlers
//!
//! Authorization URL issuance, the provider callback and session verification.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, validation_error};
use crate::models::{OAuthUrlResponse, Platform, VerifyResponse};
use crate::oauth::CallbackParams;
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthUrlQuery {
    /// Client platform: `web` (default), `android` or `ios`
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code issued by Google
    pub code: Option<String>,
    /// State blob issued with the authorization URL
    pub state: Option<String>,
    /// Provider error, e.g. `access_denied`
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    pub session_id: Option<String>,
}

/// Issue an authorization URL and a new pending session
#[utoipa::path(
    get,
    path = "/api/oauth/url",
    params(OAuthUrlQuery),
    responses(
        (status = 200, description = "Authorization URL issued", body = OAuthUrlResponse),
        (status = 400, description = "Unknown platform", body = ApiError),
        (status = 500, description = "OAuth client not configured", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn oauth_url(
    State(state): State<AppState>,
    query: Result<Query<OAuthUrlQuery>, QueryRejection>,
) -> Result<Json<OAuthUrlResponse>, ApiError> {
    let Query(query) = query?;

    let platform = match query.platform.as_deref().filter(|p| !p.trim().is_empty()) {
        None => Platform::default(),
        Some(raw) => raw.parse::<Platform>().map_err(|err| {
            validation_error(
                &err.to_string(),
                serde_json::json!({ "platform": "must be one of web, android, ios" }),
            )
        })?,
    };

    let request = state.oauth.begin_auth(platform).await?;

    Ok(Json(OAuthUrlResponse {
        oauth_url: request.authorization_url,
        session_id: request.session_id,
    }))
}

/// Provider redirect target; always answers with a redirect
#[utoipa::path(
    get,
    path = "/api/oauth/callback",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Redirect to the web frontend or the app deep link")
    ),
    tag = "oauth"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    // A malformed query is treated as missing parameters so the browser is still redirected.
    let params = match query {
        Ok(Query(query)) => CallbackParams {
            code: query.code,
            state: query.state,
            error: query.error,
        },
        Err(_) => CallbackParams::default(),
    };

    let target = state.oauth.handle_callback(params).await;
    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

/// Whether a session is authenticated
#[utoipa::path(
    get,
    path = "/api/oauth/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Authentication status", body = VerifyResponse)
    ),
    tag = "oauth"
)]
pub async fn verify(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Json<VerifyResponse> {
    let authenticated = match query {
        Ok(Query(VerifyQuery {
            session_id: Some(session_id),
        })) if !session_id.is_empty() => state.oauth.verify(&session_id).await,
        _ => false,
    };

    Json(VerifyResponse { authenticated })
}
