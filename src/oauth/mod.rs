//! # OAuth Exchange
//!
//! Drives a session from `NEW` through `AWAITING_CALLBACK` to `AUTHENTICATED`.
//! `begin_auth` stores a pending session together with an anti-forgery nonce;
//! `handle_callback` only authenticates a session whose stored nonce matches
//! the one carried back in `state`. The callback never fails outright: every
//! outcome is a redirect the browser can follow.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::models::{Platform, SecretToken, Session, SessionAuth};
use crate::session::{SessionStore, SessionStoreError};

pub mod google;
pub mod redirect;
pub mod state;

pub use google::{GoogleOAuthClient, OAuthClientError};
pub use redirect::{RedirectTargets, codes};
pub use state::{OAuthState, StateError};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error(transparent)]
    Client(#[from] OAuthClientError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Client(OAuthClientError::MissingCredentials) => {
                tracing::error!("OAuth requested but Google client credentials are missing");
                anyhow::anyhow!("OAuth client is not configured").into()
            }
            other => anyhow::Error::new(other).into(),
        }
    }
}

/// Result of [`OAuthExchange::begin_auth`].
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub session_id: String,
}

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub struct OAuthExchange {
    store: Arc<dyn SessionStore>,
    client: GoogleOAuthClient,
    redirects: RedirectTargets,
}

impl OAuthExchange {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: GoogleOAuthClient,
        redirects: RedirectTargets,
    ) -> Self {
        Self {
            store,
            client,
            redirects,
        }
    }

    /// Create a pending session and the consent URL that will complete it.
    #[instrument(skip(self))]
    pub async fn begin_auth(&self, platform: Platform) -> Result<AuthorizationRequest, OAuthError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let nonce = state::generate_nonce();

        let encoded_state = OAuthState {
            session_id: session_id.clone(),
            platform,
            nonce: nonce.clone(),
        }
        .encode();
        let authorization_url = self.client.authorization_url(&encoded_state)?;

        self.store
            .create(Session::pending(
                session_id.clone(),
                platform,
                SecretToken::new(nonce),
                Utc::now(),
            ))
            .await?;

        info!(session_id = %session_id, platform = %platform, "Issued authorization URL");

        Ok(AuthorizationRequest {
            authorization_url: authorization_url.into(),
            session_id,
        })
    }

    /// Settle a provider callback into a redirect target.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, params: CallbackParams) -> String {
        let decoded = params
            .state
            .as_deref()
            .map(OAuthState::decode)
            .transpose();

        if let Some(provider_error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            let platform = match &decoded {
                Ok(Some(state)) => {
                    self.discard_if_issued(state).await;
                    state.platform
                }
                _ => Platform::Web,
            };
            warn!(error = provider_error, "Provider returned an authorization error");
            return self.fail("provider_error", platform, provider_error);
        }

        let (Some(code), Some(_)) = (
            params.code.as_deref().filter(|c| !c.is_empty()),
            params.state.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return self.fail("missing_parameters", Platform::Web, codes::MISSING_PARAMETERS);
        };

        let state = match decoded {
            Ok(Some(state)) => state,
            Ok(None) | Err(_) => {
                warn!("Callback state could not be decoded");
                return self.fail("invalid_state", Platform::Web, codes::INVALID_STATE);
            }
        };

        let Some(session) = self.issued_pending_session(&state).await else {
            warn!(session_id = %state.session_id, "Callback state does not match an issued session");
            return self.fail("invalid_state", state.platform, codes::INVALID_STATE);
        };

        let token_response = match self.client.exchange_code(code).await {
            Ok(response) => response,
            Err(err) => {
                warn!(session_id = %session.session_id, error = %err, "Token exchange failed");
                self.store.delete(&session.session_id).await;
                return self.fail(
                    "token_exchange_failed",
                    session.platform,
                    codes::TOKEN_EXCHANGE_FAILED,
                );
            }
        };

        let expires_at = token_response.expires_at(Utc::now());
        match self
            .store
            .authenticate(
                &session.session_id,
                &state.nonce,
                token_response.into_bundle(),
                expires_at,
            )
            .await
        {
            Ok(session) => {
                counter!("oauth_callbacks_total", "outcome" => "success").increment(1);
                info!(session_id = %session.session_id, platform = %session.platform, "Session authenticated");
                self.redirects
                    .success(session.platform, &session.session_id)
            }
            Err(err) => {
                // Swept or consumed between lookup and exchange.
                warn!(session_id = %session.session_id, error = %err, "Session could not be authenticated");
                self.fail("invalid_state", session.platform, codes::INVALID_STATE)
            }
        }
    }

    /// Whether the session exists and holds a usable access token. Unknown and
    /// pending sessions are indistinguishable.
    pub async fn verify(&self, session_id: &str) -> bool {
        self.store
            .get(session_id)
            .await
            .is_some_and(|session| session.valid_access_token(Utc::now()).is_some())
    }

    /// The pending session `state` refers to, if its nonce matches.
    async fn issued_pending_session(&self, state: &OAuthState) -> Option<Session> {
        let session = self.store.get(&state.session_id).await?;
        let nonce_matches = match &session.auth {
            SessionAuth::Pending { nonce } => {
                bool::from(nonce.expose().as_bytes().ct_eq(state.nonce.as_bytes()))
            }
            SessionAuth::Authenticated { .. } => false,
        };
        nonce_matches.then_some(session)
    }

    async fn discard_if_issued(&self, state: &OAuthState) {
        if let Some(session) = self.issued_pending_session(state).await {
            self.store.delete(&session.session_id).await;
        }
    }

    fn fail(&self, outcome: &'static str, platform: Platform, code: &str) -> String {
        counter!("oauth_callbacks_total", "outcome" => outcome).increment(1);
        self.redirects.error(platform, code)
    }
}
