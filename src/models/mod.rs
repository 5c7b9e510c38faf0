//! # Data Models
//!
//! Session records, Google wire types and the JSON bodies served by the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod drive;
pub mod oauth;
pub mod picker;
pub mod session;

pub use drive::{DriveFile, DriveFileList};
pub use oauth::{OAuthUrlResponse, VerifyResponse};
pub use picker::{MediaItem, MediaItemsResponse, PickerPollResponse, PickerSessionResponse};
pub use session::{Platform, SecretToken, Session, SessionAuth, SessionPatch, TokenBundle};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "picker-proxy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }
    }
}
