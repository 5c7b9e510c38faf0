//! Session-scoped Photos Picker operations and the image proxy.

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use super::{MediaStream, ProxyError, resolve_access_token};
use crate::config::UpstreamConfig;
use crate::google::{PhotosPickerClient, UpstreamApi, UpstreamError};
use crate::models::{MediaItem, MediaItemsResponse, PickerPollResponse, PickerSessionResponse};
use crate::session::SessionStore;

pub const DEFAULT_IMAGE_DIMENSION: u32 = 300;
pub const MAX_IMAGE_DIMENSION: u32 = 16_384;
pub const IMAGE_CACHE_CONTROL: &str = "private, max-age=300";
const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Requested rendition of a proxied image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageRequest {
    fn dimension(field: &'static str, value: Option<u32>) -> Result<u32, ProxyError> {
        let value = value.unwrap_or(DEFAULT_IMAGE_DIMENSION);
        if (1..=MAX_IMAGE_DIMENSION).contains(&value) {
            Ok(value)
        } else {
            Err(ProxyError::validation(
                field,
                format!("must be between 1 and {MAX_IMAGE_DIMENSION}"),
            ))
        }
    }

    pub fn resolve(&self) -> Result<(u32, u32), ProxyError> {
        Ok((
            Self::dimension("w", self.width)?,
            Self::dimension("h", self.height)?,
        ))
    }
}

pub struct PickerProxy {
    store: Arc<dyn SessionStore>,
    client: PhotosPickerClient,
    public_base_url: String,
    media_host_allowlist: Vec<String>,
}

impl PickerProxy {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: PhotosPickerClient,
        config: &UpstreamConfig,
    ) -> Self {
        Self {
            store,
            client,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            media_host_allowlist: config
                .media_host_allowlist
                .iter()
                .map(|host| host.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Open a hosted picker for the session's user.
    #[instrument(skip(self))]
    pub async fn create_picker_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<PickerSessionResponse, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        let session = self.client.create_session(&token).await?;

        let picker_uri = session.picker_uri.ok_or_else(|| UpstreamError::Decode {
            api: UpstreamApi::PhotosPicker,
            message: "picking session has no pickerUri".to_string(),
        })?;
        let polling = session.polling_config.unwrap_or_default();

        Ok(PickerSessionResponse {
            picker_uri,
            session_id: session.id.clone(),
            picker_session_id: session.id,
            poll_interval: polling.poll_interval,
            timeout_in: polling.timeout_in,
        })
    }

    /// One status round trip; never waits server-side.
    #[instrument(skip(self))]
    pub async fn poll_picker_session(
        &self,
        session_id: Option<&str>,
        picker_session_id: &str,
    ) -> Result<PickerPollResponse, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        let session = self.client.get_session(&token, picker_session_id).await?;
        let media_items_set = session.media_items_set.unwrap_or(false);

        Ok(PickerPollResponse {
            completed: media_items_set,
            media_items_set,
        })
    }

    /// One page of picked items, each with a `proxyUrl` bound to this session.
    #[instrument(skip(self))]
    pub async fn fetch_selected_media(
        &self,
        session_id: Option<&str>,
        picker_session_id: &str,
        page_token: Option<&str>,
    ) -> Result<MediaItemsResponse, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), session_id).await?;
        // resolve_access_token rejected a missing id above
        let session_id = session_id.unwrap_or_default().trim();

        let page = self
            .client
            .list_media_items(&token, picker_session_id, page_token)
            .await?;

        let media_items: Vec<MediaItem> = page
            .media_items
            .into_iter()
            .map(MediaItem::from)
            .map(|mut item| {
                item.proxy_url = item
                    .base_url
                    .as_deref()
                    .map(|base_url| self.proxy_url(session_id, base_url));
                item
            })
            .collect();

        debug!(count = media_items.len(), "Fetched selected media items");

        Ok(MediaItemsResponse {
            media_items,
            next_page_token: page.next_page_token,
        })
    }

    /// Stream a sized rendition of a picked item.
    #[instrument(skip(self, encoded_media_url))]
    pub async fn proxy_image(
        &self,
        session_id: &str,
        encoded_media_url: &str,
        request: ImageRequest,
    ) -> Result<MediaStream, ProxyError> {
        let token = resolve_access_token(self.store.as_ref(), Some(session_id)).await?;
        let (width, height) = request.resolve()?;
        let media_url = self.decode_media_url(encoded_media_url)?;

        let upstream = self
            .client
            .fetch_media(&token, media_url.as_str(), width, height)
            .await?;

        Ok(MediaStream::from_upstream(upstream, DEFAULT_IMAGE_CONTENT_TYPE)
            .with_cache_control(IMAGE_CACHE_CONTROL))
    }

    /// `<public base>/api/picker/image/<sessionId>/<base64url(baseUrl)>`
    pub fn proxy_url(&self, session_id: &str, base_url: &str) -> String {
        format!(
            "{}/api/picker/image/{}/{}",
            self.public_base_url,
            session_id,
            base64_url::encode(base_url)
        )
    }

    /// Accepts a base64url path segment or an already-decoded absolute URL,
    /// and only hosts on the allowlist.
    fn decode_media_url(&self, encoded: &str) -> Result<Url, ProxyError> {
        let url = match Url::parse(encoded) {
            Ok(url) => url,
            Err(_) => base64_url::decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .and_then(|decoded| Url::parse(&decoded).ok())
                .ok_or_else(|| ProxyError::validation("imageUrl", "not a valid media URL"))?,
        };

        if !matches!(url.scheme(), "https" | "http") {
            return Err(ProxyError::validation(
                "imageUrl",
                "unsupported URL scheme",
            ));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let allowed = self.media_host_allowlist.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if !allowed {
            return Err(ProxyError::validation(
                "imageUrl",
                "host is not an allowed media host",
            ));
        }

        Ok(url)
    }
}
