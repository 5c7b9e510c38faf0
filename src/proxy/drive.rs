//! Session-scoped Drive operations.

use std::sync::Arc;

use tracing::instrument;

use super::{MediaStream, ProxyError, resolve_access_token};
use crate::google::{DriveClient, ListFilesParams};
use crate::models::{DriveFile, DriveFileList};
use crate::session::SessionStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_DOWNLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Listing parameters as received from the client.
#[derive(Debug, Clone, Default)]
pub struct ListDriveFilesRequest {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub query: Option<String>,
}

impl ListDriveFilesRequest {
    fn into_params(self) -> Result<ListFilesParams, ProxyError> {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ProxyError::validation(
                "pageSize",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        Ok(ListFilesParams {
            page_size,
            page_token: self.page_token.filter(|t| !t.is_empty()),
            query: self.query.filter(|q| !q.trim().is_empty()),
        })
    }
}

pub struct DriveProxy {
    store: Arc<dyn SessionStore>,
    client: DriveClient,
}

impl DriveProxy {
    pub fn new(store: Arc<dyn SessionStore>, client: DriveClient) -> Self {
        Self { store, client }
    }

    /// Forward one `files.list` page; the page token is passed through untouched.
    #[instrument(skip(self))]
    pub async fn list_drive_files(
        &self,
        session_id: Option<&str>,
        request: ListDriveFilesRequest,
    ) -> Result<DriveFileList, ProxyError> {
        let params = request.into_params()?;
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        Ok(self.client.list_files(&token, &params).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_drive_file(
        &self,
        session_id: Option<&str>,
        file_id: &str,
    ) -> Result<DriveFile, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        Ok(self.client.get_file(&token, file_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn download_drive_file(
        &self,
        session_id: Option<&str>,
        file_id: &str,
    ) -> Result<MediaStream, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        let upstream = self.client.download(&token, file_id).await?;
        Ok(MediaStream::from_upstream(
            upstream,
            DEFAULT_DOWNLOAD_CONTENT_TYPE,
        ))
    }
}
