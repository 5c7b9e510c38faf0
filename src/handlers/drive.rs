//! # Drive Handlers

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::picker::SessionQuery;
use crate::error::ApiError;
use crate::models::{DriveFile, DriveFileList};
use crate::proxy::ListDriveFilesRequest;
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DriveListQuery {
    /// Local session id
    pub session_id: Option<String>,
    /// Page size, 1..=1000 (default 20)
    pub page_size: Option<u32>,
    /// Opaque continuation token from a previous page
    pub page_token: Option<String>,
    /// Drive search expression, forwarded as `q`
    pub query: Option<String>,
}

/// List Drive files, newest first
#[utoipa::path(
    get,
    path = "/api/drive/files",
    params(DriveListQuery),
    responses(
        (status = 200, description = "One page of files", body = DriveFileList),
        (status = 400, description = "Invalid pageSize", body = ApiError),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "drive"
)]
pub async fn list_files(
    State(state): State<AppState>,
    query: Result<Query<DriveListQuery>, QueryRejection>,
) -> Result<Json<DriveFileList>, ApiError> {
    let Query(query) = query?;
    let list = state
        .drive
        .list_drive_files(
            query.session_id.as_deref(),
            ListDriveFilesRequest {
                page_size: query.page_size,
                page_token: query.page_token,
                query: query.query,
            },
        )
        .await?;
    Ok(Json(list))
}

/// Drive file metadata
#[utoipa::path(
    get,
    path = "/api/drive/files/{fileId}",
    params(
        ("fileId" = String, Path, description = "Drive file id"),
        SessionQuery
    ),
    responses(
        (status = 200, description = "File metadata", body = DriveFile),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "drive"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Json<DriveFile>, ApiError> {
    let Query(query) = query?;
    let file = state
        .drive
        .get_drive_file(query.session_id.as_deref(), &file_id)
        .await?;
    Ok(Json(file))
}

/// Stream a Drive file's content
#[utoipa::path(
    get,
    path = "/api/drive/files/{fileId}/download",
    params(
        ("fileId" = String, Path, description = "Drive file id"),
        SessionQuery
    ),
    responses(
        (status = 200, description = "File bytes"),
        (status = 401, description = "Session not usable", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "drive"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let stream = state
        .drive
        .download_drive_file(query.session_id.as_deref(), &file_id)
        .await?;
    Ok(stream.into_response())
}
