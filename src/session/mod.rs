//! # Session Store
//!
//! Process-wide mapping from session id to [`Session`]. Contents are not
//! persisted; a restart signs every client out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Session, SessionPatch, TokenBundle};

pub mod memory;
pub mod sweeper;

pub use memory::InMemorySessionStore;
pub use sweeper::SessionSweeper;

/// Session store failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session {0} already exists")]
    Duplicate(String),
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {0} is already authenticated")]
    AlreadyAuthenticated(String),
    #[error("anti-forgery nonce does not match session {0}")]
    NonceMismatch(String),
}

/// Counts of sessions removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Pending sessions older than the idle window.
    pub idle_removed: usize,
    /// Sessions whose token passed `expires_at`.
    pub expired_removed: usize,
}

impl SweepOutcome {
    pub fn total(&self) -> usize {
        self.idle_removed + self.expired_removed
    }
}

/// Predicate used by [`SessionStore::find_by`].
pub type SessionPredicate<'a> = &'a (dyn Fn(&Session) -> bool + Send + Sync);

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session, returning its id.
    async fn create(&self, session: Session) -> Result<String, SessionStoreError>;

    async fn get(&self, session_id: &str) -> Option<Session>;

    /// Merge `patch` into the session and stamp `updated_at`.
    async fn update(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Session, SessionStoreError>;

    /// Remove a session. Returns whether anything was removed.
    async fn delete(&self, session_id: &str) -> bool;

    /// First session id matching `predicate`. Linear scan.
    async fn find_by(&self, predicate: SessionPredicate<'_>) -> Option<String>;

    /// Atomically move a pending session to authenticated, provided the
    /// caller presents the nonce the session was issued with.
    async fn authenticate(
        &self,
        session_id: &str,
        expected_nonce: &str,
        tokens: TokenBundle,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Session, SessionStoreError>;

    /// Drop idle pending sessions and sessions with an expired token.
    async fn sweep(&self, now: DateTime<Utc>) -> SweepOutcome;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
