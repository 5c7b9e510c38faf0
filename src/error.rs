//! # Error Handling
//!
//! Unified error handling for the picker proxy API, rendering every failure as a
//! problem+json envelope that carries the request trace id.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Maximum number of characters of an upstream body echoed back for diagnostics.
pub const BODY_SNIPPET_LIMIT: usize = 200;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Request trace id, or a generated correlation id outside a request scope
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Session ID is required")]
    SessionRequired,
    #[error("Invalid session ID")]
    InvalidSession,
    #[error("Session not authenticated")]
    SessionNotAuthenticated,
    #[error("Access token expired")]
    TokenExpired,
    #[error("Internal Server Error")]
    InternalServerError,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::SessionRequired
            | ErrorType::InvalidSession
            | ErrorType::SessionNotAuthenticated
            | ErrorType::TokenExpired => StatusCode::UNAUTHORIZED,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::SessionRequired => "SESSION_REQUIRED",
            ErrorType::InvalidSession => "INVALID_SESSION",
            ErrorType::SessionNotAuthenticated => "SESSION_NOT_AUTHENTICATED",
            ErrorType::TokenExpired => "TOKEN_EXPIRED",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Upstream provider error information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderError {
    /// Provider identifier (e.g., "photos_picker", "drive")
    pub provider: String,
    /// HTTP status code from upstream
    pub status: u16,
    /// Response body snippet from upstream (truncated)
    pub body_snippet: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code(),
            &error_type.to_string(),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            &format!("Invalid query parameters: {}", rejection.body_text()),
        )
    }
}

fn truncate_snippet(body: String) -> String {
    if body.chars().count() > BODY_SNIPPET_LIMIT {
        let truncated: String = body.chars().take(BODY_SNIPPET_LIMIT).collect();
        format!("{}...", truncated)
    } else {
        body
    }
}

/// Create a provider upstream error.
///
/// Every non-2xx answer from Google surfaces as a 500 `PROVIDER_ERROR` with the
/// upstream status and a truncated body attached under `details`.
pub fn provider_error(provider: String, status: u16, body: Option<String>) -> ApiError {
    let provider_error = ProviderError {
        provider: provider.clone(),
        status,
        body_snippet: body.map(truncate_snippet),
    };

    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "PROVIDER_ERROR",
        &format!("Provider {} returned error status {}", provider, status),
    )
    .with_details(json!(provider_error))
}

/// Create an upstream timeout error (504)
pub fn upstream_timeout(provider: &str) -> ApiError {
    ApiError::new(
        StatusCode::GATEWAY_TIMEOUT,
        "UPSTREAM_TIMEOUT",
        &format!("Provider {} did not respond in time", provider),
    )
    .with_details(json!({ "provider": provider }))
}

/// Create an upstream transport failure error (500)
pub fn upstream_unavailable(provider: &str) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "UPSTREAM_UNAVAILABLE",
        &format!("Failed to reach provider {}", provider),
    )
    .with_details(json!({ "provider": provider }))
}

/// Create a route-not-found error echoing the requested path
pub fn not_found(path: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found")
        .with_details(json!({ "path": path }))
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

/// Create a validation error for a single missing query parameter
pub fn missing_parameter(name: &str) -> ApiError {
    validation_error(
        &format!("{} is required", name),
        json!({ name: "required" }),
    )
}
