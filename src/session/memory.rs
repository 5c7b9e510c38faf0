//! In-memory [`SessionStore`] guarded by a single `RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SessionPredicate, SessionStore, SessionStoreError, SweepOutcome};
use crate::models::{Session, SessionAuth, SessionPatch, TokenBundle};

pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    idle_ttl: Duration,
}

impl InMemorySessionStore {
    /// Create a store whose sweep drops pending sessions older than `idle_ttl`.
    pub fn new(idle_ttl: std::time::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: Duration::from_std(idle_ttl).unwrap_or(Duration::MAX),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(3600))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<String, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(SessionStoreError::Duplicate(session.session_id));
        }
        let session_id = session.session_id.clone();
        sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn update(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Session, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;

        if let Some(platform) = patch.platform {
            session.platform = platform;
        }
        if let Some(auth) = patch.auth {
            session.auth = auth;
        }
        session.updated_at = Utc::now();

        Ok(session.clone())
    }

    async fn delete(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    async fn find_by(&self, predicate: SessionPredicate<'_>) -> Option<String> {
        self.sessions
            .read()
            .await
            .values()
            .find(|session| predicate(session))
            .map(|session| session.session_id.clone())
    }

    async fn authenticate(
        &self,
        session_id: &str,
        expected_nonce: &str,
        tokens: TokenBundle,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Session, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;

        let nonce_matches = match &session.auth {
            SessionAuth::Pending { nonce } => bool::from(
                nonce
                    .expose()
                    .as_bytes()
                    .ct_eq(expected_nonce.as_bytes()),
            ),
            SessionAuth::Authenticated { .. } => {
                return Err(SessionStoreError::AlreadyAuthenticated(
                    session_id.to_string(),
                ));
            }
        };

        if !nonce_matches {
            return Err(SessionStoreError::NonceMismatch(session_id.to_string()));
        }

        session.auth = SessionAuth::Authenticated { tokens, expires_at };
        session.updated_at = Utc::now();

        Ok(session.clone())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> SweepOutcome {
        let idle_cutoff = now.checked_sub_signed(self.idle_ttl);
        let mut outcome = SweepOutcome::default();

        self.sessions.write().await.retain(|session_id, session| {
            let keep = match &session.auth {
                SessionAuth::Pending { .. } => {
                    let idle = idle_cutoff.is_some_and(|cutoff| session.created_at <= cutoff);
                    if idle {
                        outcome.idle_removed += 1;
                    }
                    !idle
                }
                SessionAuth::Authenticated { .. } => {
                    let expired = session.is_expired(now);
                    if expired {
                        outcome.expired_removed += 1;
                    }
                    !expired
                }
            };
            if !keep {
                debug!(session_id = %session_id, "Sweeping session");
            }
            keep
        });

        outcome
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
