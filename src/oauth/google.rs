//! Google OAuth 2.0 endpoints: authorization URL and code exchange.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::AppConfig;
use crate::google::{UpstreamApi, UpstreamError, UpstreamHttp};
use crate::models::{SecretToken, TokenBundle};

#[derive(Debug, Error)]
pub enum OAuthClientError {
    #[error("Google OAuth client credentials are not configured")]
    MissingCredentials,
    #[error("invalid authorization endpoint: {0}")]
    InvalidAuthUrl(#[from] url::ParseError),
    #[error("token exchange failed: {0}")]
    Exchange(#[from] UpstreamError),
}

/// Google token endpoint response.
#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl GoogleTokenResponse {
    /// Absolute expiry derived from `expires_in`, if reported.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .and_then(|secs| now.checked_add_signed(Duration::seconds(secs)))
    }

    pub fn into_bundle(self) -> TokenBundle {
        TokenBundle {
            access_token: SecretToken::new(self.access_token),
            refresh_token: self.refresh_token.map(SecretToken::new),
            token_type: self.token_type,
            scope: self.scope,
        }
    }
}

/// OAuth client bound to one registered redirect URI.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: UpstreamHttp,
    client_id: Option<String>,
    client_secret: Option<SecretToken>,
    auth_url: String,
    token_url: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl GoogleOAuthClient {
    pub fn new(http: UpstreamHttp, config: &AppConfig) -> Self {
        Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone().map(SecretToken::new),
            auth_url: config.oauth.auth_url.clone(),
            token_url: config.oauth.token_url.clone(),
            redirect_uri: config.oauth.redirect_uri.clone(),
            scopes: config.oauth.scopes.clone(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn client_id(&self) -> Result<&str, OAuthClientError> {
        self.client_id
            .as_deref()
            .ok_or(OAuthClientError::MissingCredentials)
    }

    /// Build the consent-screen URL carrying `state`.
    pub fn authorization_url(&self, state: &str) -> Result<Url, OAuthClientError> {
        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.client_id()?)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for tokens using the same redirect URI
    /// the authorization URL was built with.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokenResponse, OAuthClientError> {
        let client_id = self.client_id()?;
        let client_secret = self
            .client_secret
            .as_ref()
            .ok_or(OAuthClientError::MissingCredentials)?;

        let mut params = HashMap::new();
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret.expose());
        params.insert("code", code);
        params.insert("grant_type", "authorization_code");
        params.insert("redirect_uri", self.redirect_uri.as_str());

        let request = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params);

        Ok(self.http.send_json(UpstreamApi::OAuthToken, request).await?)
    }
}
