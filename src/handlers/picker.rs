//! # Photos Picker Handlers

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, missing_parameter};
use crate::models::{MediaItemsResponse, PickerPollResponse, PickerSessionResponse};
use crate::proxy::ImageRequest;
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// Local session id returned by `/api/oauth/url`
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PickerQuery {
    /// Local session id
    pub session_id: Option<String>,
    /// External picker session id returned by `/api/picker/session`
    pub picker_session_id: Option<String>,
    /// Continuation token from a previous result page
    pub page_token: Option<String>,
}

impl PickerQuery {
    fn picker_session_id(&self) -> Result<&str, ApiError> {
        self.picker_session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| missing_parameter("pickerSessionId"))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageQuery {
    /// Width in pixels (default 300)
    pub w: Option<u32>,
    /// Height in pixels (default 300)
    pub h: Option<u32>,
}

/// Open a hosted Photos picker
#[utoipa::path(
    get,
    path = "/api/picker/session",
    params(SessionQuery),
    responses(
        (status = 200, description = "Picker session created", body = PickerSessionResponse),
        (status = 401, description = "Missing, unknown, unauthenticated or expired session", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError),
        (status = 504, description = "Provider timed out", body = ApiError)
    ),
    tag = "picker"
)]
pub async fn create_session(
    State(state): State<AppState>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Json<PickerSessionResponse>, ApiError> {
    let Query(query) = query?;
    let response = state
        .picker
        .create_picker_session(query.session_id.as_deref())
        .await?;
    Ok(Json(response))
}

/// Check whether the user finished picking
#[utoipa::path(
    get,
    path = "/api/picker/poll",
    params(PickerQuery),
    responses(
        (status = 200, description = "Picker status", body = PickerPollResponse),
        (status = 400, description = "Missing pickerSessionId", body = ApiError),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "picker"
)]
pub async fn poll(
    State(state): State<AppState>,
    query: Result<Query<PickerQuery>, QueryRejection>,
) -> Result<Json<PickerPollResponse>, ApiError> {
    let Query(query) = query?;
    let picker_session_id = query.picker_session_id()?;
    let response = state
        .picker
        .poll_picker_session(query.session_id.as_deref(), picker_session_id)
        .await?;
    Ok(Json(response))
}

/// Fetch the picked media items
#[utoipa::path(
    get,
    path = "/api/picker/result",
    params(PickerQuery),
    responses(
        (status = 200, description = "Picked items with proxy URLs", body = MediaItemsResponse),
        (status = 400, description = "Missing pickerSessionId", body = ApiError),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "picker"
)]
pub async fn result(
    State(state): State<AppState>,
    query: Result<Query<PickerQuery>, QueryRejection>,
) -> Result<Json<MediaItemsResponse>, ApiError> {
    let Query(query) = query?;
    let picker_session_id = query.picker_session_id()?;
    let response = state
        .picker
        .fetch_selected_media(
            query.session_id.as_deref(),
            picker_session_id,
            query.page_token.as_deref().filter(|t| !t.is_empty()),
        )
        .await?;
    Ok(Json(response))
}

/// Stream a picked image through the proxy
#[utoipa::path(
    get,
    path = "/api/picker/image/{sessionId}/{imageUrl}",
    params(
        ("sessionId" = String, Path, description = "Local session id"),
        ("imageUrl" = String, Path, description = "base64url-encoded media base URL"),
        ImageQuery
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 400, description = "Invalid media URL or dimensions", body = ApiError),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "picker"
)]
pub async fn image(
    State(state): State<AppState>,
    Path((session_id, image_url)): Path<(String, String)>,
    query: Result<Query<ImageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let stream = state
        .picker
        .proxy_image(
            &session_id,
            &image_url,
            ImageRequest {
                width: query.w,
                height: query.h,
            },
        )
        .await?;
    Ok(stream.into_response())
}
