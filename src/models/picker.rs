//! Google Photos Picker wire types and the normalised media item handed to clients.
//!
//! The Picker API has shipped two shapes for a picked item: the current one nests
//! the file under `mediaFile`, older responses carried `baseUrl`, `mimeType` and
//! `mediaMetadata` at the top level. Both are accepted here and folded into a
//! single [`MediaItem`] once, so nothing downstream needs fallback chains.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Polling hints returned alongside a picking session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    pub poll_interval: Option<String>,
    pub timeout_in: Option<String>,
}

/// Picking session as returned by `POST /sessions` and `GET /sessions/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingSession {
    pub id: String,
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default)]
    pub polling_config: Option<PollingConfig>,
    #[serde(default)]
    pub media_items_set: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaMetadata {
    pub width: Option<Value>,
    pub height: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaFile {
    pub base_url: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub media_file_metadata: Option<RawMediaMetadata>,
}

/// A picked item in either the current or the legacy shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPickedMediaItem {
    #[serde(default)]
    pub id: String,
    pub create_time: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub media_file: Option<RawMediaFile>,
    // legacy top-level fields
    pub base_url: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub media_metadata: Option<RawMediaMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaItemsPage {
    #[serde(default)]
    pub media_items: Vec<RawPickedMediaItem>,
    pub next_page_token: Option<String>,
}

/// Google reports dimensions as numbers in some payloads and strings in others.
fn dimension(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Media item with every optional field resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Locally-served URL that fetches the item through the image proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

impl From<RawPickedMediaItem> for MediaItem {
    fn from(raw: RawPickedMediaItem) -> Self {
        let file = raw.media_file.unwrap_or_default();
        let file_metadata = file.media_file_metadata.unwrap_or_default();
        let legacy_metadata = raw.media_metadata.unwrap_or_default();

        Self {
            id: raw.id,
            base_url: file.base_url.or(raw.base_url),
            mime_type: file.mime_type.or(raw.mime_type),
            filename: file.filename.or(raw.filename),
            width: dimension(file_metadata.width.as_ref())
                .or_else(|| dimension(legacy_metadata.width.as_ref())),
            height: dimension(file_metadata.height.as_ref())
                .or_else(|| dimension(legacy_metadata.height.as_ref())),
            create_time: raw.create_time,
            kind: raw.kind,
            proxy_url: None,
        }
    }
}

/// Response of `GET /api/picker/session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PickerSessionResponse {
    pub picker_uri: String,
    /// External picker session id, kept under this name for existing clients.
    pub session_id: String,
    /// Same value as `sessionId`, named unambiguously.
    pub picker_session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in: Option<String>,
}

/// Response of `GET /api/picker/poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PickerPollResponse {
    pub completed: bool,
    pub media_items_set: bool,
}

/// Response of `GET /api/picker/result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsResponse {
    pub media_items: Vec<MediaItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
