//! # Google API clients
//!
//! Thin `reqwest` clients for the Photos Picker and Drive REST APIs. Every call
//! is bounded by the configured upstream timeout, and failures are classified
//! as timeout, transport or provider-status errors.

use std::time::Duration;

use metrics::counter;
use reqwest::{Client, IntoUrl, RequestBuilder, Response};
use tokio::time;
use thiserror::Error;
use url::Url;

use crate::error::{self, ApiError};

pub mod drive;
pub mod photos_picker;

pub use drive::{DriveClient, ListFilesParams};
pub use photos_picker::PhotosPickerClient;

/// Upstream API a request was sent to; used for metrics and error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamApi {
    PhotosPicker,
    Drive,
    Media,
    OAuthToken,
}

impl UpstreamApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamApi::PhotosPicker => "photos_picker",
            UpstreamApi::Drive => "drive",
            UpstreamApi::Media => "media",
            UpstreamApi::OAuthToken => "oauth_token",
        }
    }
}

/// Failures talking to a Google API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{} request timed out", .api.as_str())]
    Timeout { api: UpstreamApi },
    #[error("{} request failed: {source}", .api.as_str())]
    Transport {
        api: UpstreamApi,
        #[source]
        source: reqwest::Error,
    },
    #[error("{} returned status {status}", .api.as_str())]
    Status {
        api: UpstreamApi,
        status: u16,
        body: Option<String>,
    },
    #[error("{} response could not be decoded: {message}", .api.as_str())]
    Decode { api: UpstreamApi, message: String },
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Classify a `reqwest` send/read failure.
    pub fn from_reqwest(api: UpstreamApi, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            UpstreamError::Timeout { api }
        } else if source.is_decode() {
            UpstreamError::Decode {
                api,
                message: source.to_string(),
            }
        } else {
            UpstreamError::Transport { api, source }
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Transport { .. } | UpstreamError::InvalidUrl(_) => "transport",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Decode { .. } => "decode",
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout { api } => {
                tracing::warn!(api = api.as_str(), "Upstream request timed out");
                error::upstream_timeout(api.as_str())
            }
            UpstreamError::Transport { api, source } => {
                tracing::warn!(api = api.as_str(), error = %source, "Upstream transport failure");
                error::upstream_unavailable(api.as_str())
            }
            UpstreamError::Status { api, status, body } => {
                tracing::warn!(api = api.as_str(), status, "Upstream returned error status");
                error::provider_error(api.as_str().to_string(), status, body)
            }
            UpstreamError::Decode { api, message } => {
                tracing::warn!(api = api.as_str(), %message, "Upstream response malformed");
                error::provider_error(api.as_str().to_string(), 200, Some(message))
            }
            UpstreamError::InvalidUrl(message) => anyhow::anyhow!(message).into(),
        }
    }
}

/// Shared HTTP client for every Google API.
///
/// JSON calls are bounded end to end by `timeout`. Streaming calls are bounded
/// only until the response headers arrive, so long bodies are not cut off.
#[derive(Clone)]
pub struct UpstreamHttp {
    client: Client,
    timeout: Duration,
}

impl UpstreamHttp {
    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send and decode a JSON body within the upstream timeout.
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        api: UpstreamApi,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let response = self.send(api, request.timeout(self.timeout)).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| UpstreamError::from_reqwest(api, err))
    }

    /// Send a request whose body the caller streams. Only the wait for the
    /// response headers is bounded.
    pub(crate) async fn send_streaming(
        &self,
        api: UpstreamApi,
        request: RequestBuilder,
    ) -> Result<Response, UpstreamError> {
        self.send(api, request).await
    }

    /// Send a prepared request, turning non-2xx answers into [`UpstreamError::Status`].
    async fn send(
        &self,
        api: UpstreamApi,
        request: RequestBuilder,
    ) -> Result<Response, UpstreamError> {
        let result = match time::timeout(self.timeout, request.send()).await {
            Err(_) => Err(UpstreamError::Timeout { api }),
            Ok(Ok(response)) if response.status().is_success() => Ok(response),
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let body = time::timeout(self.timeout, response.text())
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .filter(|b| !b.is_empty());
                Err(UpstreamError::Status { api, status, body })
            }
            Ok(Err(err)) => Err(UpstreamError::from_reqwest(api, err)),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        };
        counter!("upstream_requests_total", "api" => api.as_str(), "outcome" => outcome).increment(1);

        result
    }
}

/// Build the shared upstream client with the configured timeout.
pub fn build_http_client(timeout: Duration) -> Result<UpstreamHttp, reqwest::Error> {
    let client = Client::builder()
        .connect_timeout(timeout)
        .user_agent(concat!("picker-proxy/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(UpstreamHttp { client, timeout })
}

/// Append path segments to a configured API base URL.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
