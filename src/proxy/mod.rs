//! # Picker and Drive proxy
//!
//! Session-scoped pass-through to Google. Each operation first resolves the
//! caller's session to a usable access token, then forwards exactly one
//! upstream call. No retries and no local pagination.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use thiserror::Error;

use crate::error::{ApiError, ErrorType, validation_error};
use crate::google::UpstreamError;
use crate::models::SecretToken;
use crate::session::SessionStore;

pub mod drive;
pub mod picker;

pub use drive::{DriveProxy, ListDriveFilesRequest};
pub use picker::{ImageRequest, PickerProxy};

/// Why a session cannot be used for an upstream call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionAccessError {
    #[error("session id is required")]
    Required,
    #[error("session id is not known")]
    Invalid,
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("access token expired")]
    Expired,
}

impl From<SessionAccessError> for ApiError {
    fn from(err: SessionAccessError) -> Self {
        match err {
            SessionAccessError::Required => ErrorType::SessionRequired.into(),
            SessionAccessError::Invalid => ErrorType::InvalidSession.into(),
            SessionAccessError::NotAuthenticated => ErrorType::SessionNotAuthenticated.into(),
            SessionAccessError::Expired => ErrorType::TokenExpired.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Session(#[from] SessionAccessError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl ProxyError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ProxyError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Session(err) => err.into(),
            ProxyError::Upstream(err) => err.into(),
            ProxyError::Validation { field, message } => validation_error(
                &format!("Invalid {field}"),
                serde_json::json!({ field: message }),
            ),
        }
    }
}

/// Resolve a session id to an access token usable right now.
pub async fn resolve_access_token(
    store: &dyn SessionStore,
    session_id: Option<&str>,
) -> Result<SecretToken, SessionAccessError> {
    let session_id = session_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(SessionAccessError::Required)?;

    let session = store
        .get(session_id)
        .await
        .ok_or(SessionAccessError::Invalid)?;

    if !session.is_authenticated() {
        return Err(SessionAccessError::NotAuthenticated);
    }

    session
        .valid_access_token(Utc::now())
        .cloned()
        .ok_or(SessionAccessError::Expired)
}

/// An upstream binary body forwarded without buffering.
pub struct MediaStream {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<&'static str>,
    upstream: reqwest::Response,
}

impl MediaStream {
    pub(crate) fn from_upstream(upstream: reqwest::Response, default_content_type: &str) -> Self {
        let headers = upstream.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(default_content_type)
            .to_string();
        let content_disposition = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            content_type,
            content_length: upstream.content_length(),
            content_disposition,
            cache_control: None,
            upstream,
        }
    }

    pub(crate) fn with_cache_control(mut self, value: &'static str) -> Self {
        self.cache_control = Some(value);
        self
    }
}

impl IntoResponse for MediaStream {
    fn into_response(self) -> Response {
        let mut response =
            Response::new(Body::from_stream(self.upstream.bytes_stream()));
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        if let Some(length) = self.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }
        if let Some(disposition) = self
            .content_disposition
            .and_then(|d| HeaderValue::from_str(&d).ok())
        {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
        if let Some(cache_control) = self.cache_control {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
        }

        response
    }
}
