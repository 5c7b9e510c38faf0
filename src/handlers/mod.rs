//! # API Handlers
//!
//! HTTP endpoint handlers for the picker proxy.

use axum::{http::Uri, response::Json};

use crate::error::{self, ApiError};
use crate::models::{HealthResponse, ServiceInfo};

pub mod drive;
pub mod oauth;
pub mod picker;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    ),
    tag = "root"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Fallback for unmatched routes; echoes the requested path.
pub async fn not_found(uri: Uri) -> ApiError {
    error::not_found(uri.path())
}

#[cfg(test)]
mod tests;
