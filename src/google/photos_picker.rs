//! Google Photos Picker API client.

use reqwest::Response;
use tracing::instrument;

use super::{UpstreamApi, UpstreamError, UpstreamHttp, endpoint};
use crate::models::SecretToken;
use crate::models::picker::{PickingSession, RawMediaItemsPage};

/// Items requested per `mediaItems` page.
pub const MEDIA_ITEMS_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct PhotosPickerClient {
    http: UpstreamHttp,
    base_url: String,
}

impl PhotosPickerClient {
    pub fn new(http: UpstreamHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `POST /sessions`: open a new picking session.
    #[instrument(skip_all)]
    pub async fn create_session(
        &self,
        token: &SecretToken,
    ) -> Result<PickingSession, UpstreamError> {
        let url = endpoint(&self.base_url, &["sessions"])?;
        let request = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .json(&serde_json::json!({}));
        self.http.send_json(UpstreamApi::PhotosPicker, request).await
    }

    /// `GET /sessions/{id}`: current state of a picking session.
    #[instrument(skip(self, token))]
    pub async fn get_session(
        &self,
        token: &SecretToken,
        picker_session_id: &str,
    ) -> Result<PickingSession, UpstreamError> {
        let url = endpoint(&self.base_url, &["sessions", picker_session_id])?;
        let request = self.http.get(url).bearer_auth(token.expose());
        self.http.send_json(UpstreamApi::PhotosPicker, request).await
    }

    /// `GET /mediaItems?sessionId=…`: one page of the items the user picked.
    #[instrument(skip(self, token))]
    pub async fn list_media_items(
        &self,
        token: &SecretToken,
        picker_session_id: &str,
        page_token: Option<&str>,
    ) -> Result<RawMediaItemsPage, UpstreamError> {
        let mut url = endpoint(&self.base_url, &["mediaItems"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("sessionId", picker_session_id)
                .append_pair("pageSize", &MEDIA_ITEMS_PAGE_SIZE.to_string());
            if let Some(page_token) = page_token {
                query.append_pair("pageToken", page_token);
            }
        }
        let request = self.http.get(url).bearer_auth(token.expose());
        self.http.send_json(UpstreamApi::PhotosPicker, request).await
    }

    /// Fetch media bytes from a picked item's base URL with the dimension
    /// suffix appended. The response body is left unread for streaming.
    #[instrument(skip(self, token, base_url))]
    pub async fn fetch_media(
        &self,
        token: &SecretToken,
        base_url: &str,
        width: u32,
        height: u32,
    ) -> Result<Response, UpstreamError> {
        let request = self
            .http
            .get(sized_media_url(base_url, width, height))
            .bearer_auth(token.expose());
        self.http.send_streaming(UpstreamApi::Media, request).await
    }
}

/// `<baseUrl>=w<W>-h<H>`
pub fn sized_media_url(base_url: &str, width: u32, height: u32) -> String {
    format!("{base_url}=w{width}-h{height}")
}
