//! Google Drive v3 client.

use reqwest::Response;
use tracing::instrument;

use super::{UpstreamApi, UpstreamError, UpstreamHttp, endpoint};
use crate::models::{DriveFile, DriveFileList, SecretToken};

/// Field projection for listings.
pub const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, thumbnailLink, webViewLink, size, createdTime, modifiedTime)";

/// Field projection for single-file metadata.
pub const FILE_FIELDS: &str =
    "id, name, mimeType, thumbnailLink, webViewLink, size, createdTime, modifiedTime, description";

pub const LIST_ORDER_BY: &str = "modifiedTime desc";

/// Parameters forwarded to `files.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilesParams {
    pub page_size: u32,
    pub page_token: Option<String>,
    pub query: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    http: UpstreamHttp,
    base_url: String,
}

impl DriveClient {
    pub fn new(http: UpstreamHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `GET /files`
    #[instrument(skip(self, token))]
    pub async fn list_files(
        &self,
        token: &SecretToken,
        params: &ListFilesParams,
    ) -> Result<DriveFileList, UpstreamError> {
        let mut url = endpoint(&self.base_url, &["files"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pageSize", &params.page_size.to_string())
                .append_pair("fields", LIST_FIELDS)
                .append_pair("orderBy", LIST_ORDER_BY);
            if let Some(page_token) = &params.page_token {
                query.append_pair("pageToken", page_token);
            }
            if let Some(q) = &params.query {
                query.append_pair("q", q);
            }
        }
        let request = self.http.get(url).bearer_auth(token.expose());
        self.http.send_json(UpstreamApi::Drive, request).await
    }

    /// `GET /files/{id}`
    #[instrument(skip(self, token))]
    pub async fn get_file(
        &self,
        token: &SecretToken,
        file_id: &str,
    ) -> Result<DriveFile, UpstreamError> {
        let mut url = endpoint(&self.base_url, &["files", file_id])?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);
        let request = self.http.get(url).bearer_auth(token.expose());
        self.http.send_json(UpstreamApi::Drive, request).await
    }

    /// `GET /files/{id}?alt=media`. The body is left unread for streaming.
    #[instrument(skip(self, token))]
    pub async fn download(
        &self,
        token: &SecretToken,
        file_id: &str,
    ) -> Result<Response, UpstreamError> {
        let mut url = endpoint(&self.base_url, &["files", file_id])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let request = self.http.get(url).bearer_auth(token.expose());
        self.http.send_streaming(UpstreamApi::Drive, request).await
    }
}
