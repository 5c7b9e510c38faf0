//! Typed access to the picker proxy's HTTP surface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::ClientError;
use crate::models::{
    DriveFileList, MediaItemsResponse, OAuthUrlResponse, PickerPollResponse,
    PickerSessionResponse, Platform, VerifyResponse,
};
use crate::proxy::ListDriveFilesRequest;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn oauth_url(&self, platform: Platform) -> Result<OAuthUrlResponse, ClientError>;

    async fn verify(&self, session_id: &str) -> Result<bool, ClientError>;

    async fn create_picker_session(
        &self,
        session_id: &str,
    ) -> Result<PickerSessionResponse, ClientError>;

    async fn poll_picker_session(
        &self,
        session_id: &str,
        picker_session_id: &str,
    ) -> Result<PickerPollResponse, ClientError>;

    async fn fetch_selected_media(
        &self,
        session_id: &str,
        picker_session_id: &str,
        page_token: Option<&str>,
    ) -> Result<MediaItemsResponse, ClientError>;

    async fn list_drive_files(
        &self,
        session_id: &str,
        request: &ListDriveFilesRequest,
    ) -> Result<DriveFileList, ClientError>;
}

/// Error envelope fields the client cares about.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct HttpBackendApi {
    http: Client,
    base_url: String,
}

impl HttpBackendApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
            return Err(ClientError::Backend {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(|b| b.code.clone()),
                message: parsed
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BackendApi for HttpBackendApi {
    #[instrument(skip(self))]
    async fn oauth_url(&self, platform: Platform) -> Result<OAuthUrlResponse, ClientError> {
        self.get_json("/api/oauth/url", &[("platform", platform.as_str())])
            .await
    }

    #[instrument(skip(self))]
    async fn verify(&self, session_id: &str) -> Result<bool, ClientError> {
        let response: VerifyResponse = self
            .get_json("/api/oauth/verify", &[("sessionId", session_id)])
            .await?;
        Ok(response.authenticated)
    }

    #[instrument(skip(self))]
    async fn create_picker_session(
        &self,
        session_id: &str,
    ) -> Result<PickerSessionResponse, ClientError> {
        self.get_json("/api/picker/session", &[("sessionId", session_id)])
            .await
    }

    #[instrument(skip(self))]
    async fn poll_picker_session(
        &self,
        session_id: &str,
        picker_session_id: &str,
    ) -> Result<PickerPollResponse, ClientError> {
        self.get_json(
            "/api/picker/poll",
            &[
                ("sessionId", session_id),
                ("pickerSessionId", picker_session_id),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_selected_media(
        &self,
        session_id: &str,
        picker_session_id: &str,
        page_token: Option<&str>,
    ) -> Result<MediaItemsResponse, ClientError> {
        let mut query = vec![
            ("sessionId", session_id),
            ("pickerSessionId", picker_session_id),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.get_json("/api/picker/result", &query).await
    }

    #[instrument(skip(self))]
    async fn list_drive_files(
        &self,
        session_id: &str,
        request: &ListDriveFilesRequest,
    ) -> Result<DriveFileList, ClientError> {
        let page_size = request.page_size.map(|n| n.to_string());
        let mut query = vec![("sessionId", session_id)];
        if let Some(page_size) = page_size.as_deref() {
            query.push(("pageSize", page_size));
        }
        if let Some(token) = request.page_token.as_deref() {
            query.push(("pageToken", token));
        }
        if let Some(q) = request.query.as_deref() {
            query.push(("query", q));
        }
        self.get_json("/api/drive/files", &query).await
    }
}
