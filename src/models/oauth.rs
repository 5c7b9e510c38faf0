//! Request and response bodies of the OAuth routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response of `GET /api/oauth/url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuthUrlResponse {
    pub oauth_url: String,
    pub session_id: String,
}

/// Response of `GET /api/oauth/verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub authenticated: bool,
}
