//! The OAuth `state` blob: base64 of `{"sessionId","platform","nonce"}`.
//!
//! The blob routes the callback back to its session and platform. On its own
//! it proves nothing; the nonce must also match the one stored on the pending
//! session.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Platform;

/// Raw nonce length before encoding.
pub const NONCE_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state is not valid base64")]
    Encoding,
    #[error("state payload is malformed: {0}")]
    Payload(String),
}

/// Decoded `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    pub session_id: String,
    pub platform: Platform,
    pub nonce: String,
}

impl OAuthState {
    pub fn encode(&self) -> String {
        // Serialising three strings and an enum cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self, StateError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| StateError::Encoding)?;
        serde_json::from_slice(&bytes).map_err(|e| StateError::Payload(e.to_string()))
    }
}

/// Random anti-forgery nonce, URL-safe base64.
pub fn generate_nonce() -> String {
    use rand::Rng;

    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}
