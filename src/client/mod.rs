//! # Client Controller
//!
//! Device-side driver of the sign-in and picking flows. The controller owns
//! the client state machine:
//!
//! `SignedOut -> SigningIn -> SignedIn -> (PickerOpen -> Polling -> ResultsReady)*`
//!
//! with `SignedOut` reachable from every state through [`ClientController::sign_out`].
//! Sign-in completion may be reported through the web redirect, a deep link, or
//! by polling `verify`; all three funnel into [`ClientController::handle_callback`],
//! which is idempotent.

pub mod api;
pub mod callback;
pub mod launcher;
pub mod poller;
pub mod storage;

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use api::{BackendApi, HttpBackendApi};
pub use callback::{CallbackOutcome, CallbackParseError};
pub use launcher::{Launcher, PrintUrl, SystemBrowser};
pub use poller::{BackoffPolicy, PollError, poll_until};
pub use storage::{FileSessionIdStore, MemorySessionIdStore, SessionIdStore};

use crate::models::{DriveFileList, MediaItem, PickerSessionResponse, Platform};
use crate::proxy::ListDriveFilesRequest;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("session storage error: {0}")]
    Storage(String),
    #[error("could not open browser: {0}")]
    Launch(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("sign-in failed: {0}")]
    SignInFailed(String),
    #[error(transparent)]
    Callback(#[from] CallbackParseError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("result discarded after sign-out or a newer request")]
    Superseded,
}

impl ClientError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    SignedOut,
    SigningIn,
    SignedIn,
    PickerOpen { picker_session_id: String },
    Polling { picker_session_id: String },
    ResultsReady { media_items: Vec<MediaItem> },
}

struct Inner {
    session_id: Option<String>,
    /// Session id issued by the sign-in attempt still awaiting its callback.
    pending_sign_in: Option<String>,
    /// Bumped whenever in-flight work must stop applying its results.
    generation: u64,
    cancel: CancellationToken,
}

impl Inner {
    /// Cancel outstanding work and start a new generation.
    fn invalidate(&mut self) -> (u64, CancellationToken) {
        self.pending_sign_in = None;
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        (self.generation, self.cancel.clone())
    }
}

pub struct ClientController<B, S, L> {
    api: B,
    store: S,
    launcher: L,
    platform: Platform,
    policy: BackoffPolicy,
    state: watch::Sender<ClientState>,
    inner: Mutex<Inner>,
}

impl<B, S, L> ClientController<B, S, L>
where
    B: BackendApi,
    S: SessionIdStore,
    L: Launcher,
{
    pub fn new(api: B, store: S, launcher: L, platform: Platform) -> Self {
        Self {
            api,
            store,
            launcher,
            platform,
            policy: BackoffPolicy::default(),
            state: watch::Sender::new(ClientState::SignedOut),
            inner: Mutex::new(Inner {
                session_id: None,
                pending_sign_in: None,
                generation: 0,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner().session_id.clone()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ClientState) {
        self.state.send_replace(state);
    }

    fn require_session(&self) -> Result<String, ClientError> {
        self.session_id().ok_or(ClientError::NotSignedIn)
    }

    /// Resume a persisted session. Returns whether the client is signed in.
    ///
    /// A session the backend no longer recognises is discarded; a transport
    /// failure leaves it persisted so a later attempt can retry.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<bool, ClientError> {
        let Some(session_id) = self.store.load()? else {
            self.set_state(ClientState::SignedOut);
            return Ok(false);
        };

        if self.api.verify(&session_id).await? {
            self.inner().session_id = Some(session_id);
            self.set_state(ClientState::SignedIn);
            info!("Restored persisted session");
            Ok(true)
        } else {
            self.store.clear()?;
            self.inner().session_id = None;
            self.set_state(ClientState::SignedOut);
            info!("Discarded stale persisted session");
            Ok(false)
        }
    }

    /// Request an authorization URL and hand it to the launcher.
    ///
    /// Returns the pending session id. Completion arrives later through
    /// [`handle_callback`](Self::handle_callback) or
    /// [`await_sign_in`](Self::await_sign_in).
    #[instrument(skip(self))]
    pub async fn begin_sign_in(&self) -> Result<String, ClientError> {
        let generation = {
            let mut inner = self.inner();
            let (generation, _) = inner.invalidate();
            self.set_state(ClientState::SigningIn);
            generation
        };

        let result = self.request_authorization(generation).await;
        if let Err(err) = &result {
            let mut inner = self.inner();
            if inner.generation == generation && !matches!(err, ClientError::Superseded) {
                inner.pending_sign_in = None;
                self.set_state(ClientState::SignedOut);
            }
        }
        result
    }

    async fn request_authorization(&self, generation: u64) -> Result<String, ClientError> {
        let response = self.api.oauth_url(self.platform).await?;
        {
            let mut inner = self.inner();
            if inner.generation != generation {
                return Err(ClientError::Superseded);
            }
            // Recorded before launching so an early callback finds it.
            inner.pending_sign_in = Some(response.session_id.clone());
        }
        self.launcher.open(&response.oauth_url)?;
        Ok(response.session_id)
    }

    /// Apply a completion report from any channel.
    ///
    /// Only the sign-in attempt started by [`begin_sign_in`](Self::begin_sign_in)
    /// is completed, and only once. Returns `Ok(true)` when the report changed
    /// state and `Ok(false)` when it duplicated one already applied or arrived
    /// when no sign-in was running, e.g. after sign-out.
    pub fn handle_callback(&self, outcome: CallbackOutcome) -> Result<bool, ClientError> {
        let mut inner = self.inner();
        match outcome {
            CallbackOutcome::Success { session_id } => {
                if inner.pending_sign_in.as_deref() != Some(session_id.as_str()) {
                    debug!(session_id = %session_id, "Ignoring callback for no pending sign-in");
                    return Ok(false);
                }

                self.store.save(&session_id)?;
                inner.invalidate();
                inner.session_id = Some(session_id);
                self.set_state(ClientState::SignedIn);
                info!("Signed in");
                Ok(true)
            }
            CallbackOutcome::Failure { error } => {
                if inner.pending_sign_in.is_none() {
                    warn!(%error, "Ignoring sign-in failure outside a sign-in attempt");
                    return Ok(false);
                }

                inner.invalidate();
                self.set_state(ClientState::SignedOut);
                warn!(%error, "Sign-in failed");
                Err(ClientError::SignInFailed(error))
            }
        }
    }

    /// Adopt a session id delivered out of band, e.g. a deep link handed to a
    /// fresh process. The backend must confirm it is authenticated.
    #[instrument(skip(self))]
    pub async fn adopt_session(&self, session_id: &str) -> Result<bool, ClientError> {
        let generation = self.inner().generation;
        if !self.api.verify(session_id).await? {
            return Ok(false);
        }

        let mut inner = self.inner();
        if inner.generation != generation {
            return Err(ClientError::Superseded);
        }
        self.store.save(session_id)?;
        inner.invalidate();
        inner.session_id = Some(session_id.to_string());
        self.set_state(ClientState::SignedIn);
        info!("Adopted session");
        Ok(true)
    }

    pub fn handle_callback_url(&self, url: &str) -> Result<bool, ClientError> {
        self.handle_callback(CallbackOutcome::from_url(url)?)
    }

    /// Wait for `session_id` to become authenticated by polling `verify`.
    ///
    /// For clients that have no redirect or deep-link receiver. A callback that
    /// lands on another channel meanwhile ends the wait successfully.
    #[instrument(skip(self))]
    pub async fn await_sign_in(&self, session_id: &str) -> Result<(), ClientError> {
        let cancel = self.inner().cancel.clone();
        let api = &self.api;

        let polled = poll_until(&self.policy, &cancel, || async move {
            Ok(api.verify(session_id).await?.then_some(()))
        })
        .await;

        match polled {
            Ok(()) => {
                self.handle_callback(CallbackOutcome::Success {
                    session_id: session_id.to_string(),
                })?;
                Ok(())
            }
            Err(PollError::Cancelled) if self.session_id().as_deref() == Some(session_id) => Ok(()),
            Err(err) => {
                let mut inner = self.inner();
                if inner.pending_sign_in.as_deref() == Some(session_id) {
                    inner.pending_sign_in = None;
                    self.set_state(ClientState::SignedOut);
                }
                Err(err.into())
            }
        }
    }

    /// Sign in end to end, completing through `verify` polling.
    pub async fn sign_in(&self) -> Result<String, ClientError> {
        let session_id = self.begin_sign_in().await?;
        self.await_sign_in(&session_id).await?;
        Ok(session_id)
    }

    /// Create a hosted picker and open it. Cancels any poll still running.
    #[instrument(skip(self))]
    pub async fn open_picker(&self) -> Result<PickerSessionResponse, ClientError> {
        let session_id = self.require_session()?;
        let (generation, _) = self.inner().invalidate();

        let picker = self.api.create_picker_session(&session_id).await?;
        {
            let inner = self.inner();
            if inner.generation != generation {
                return Err(ClientError::Superseded);
            }
            self.set_state(ClientState::PickerOpen {
                picker_session_id: picker.picker_session_id.clone(),
            });
        }

        self.launcher.open(&picker.picker_uri)?;
        Ok(picker)
    }

    /// Poll until the user finishes picking, then fetch every selected item.
    ///
    /// Results that arrive after sign-out or after a newer picker was opened
    /// are dropped with [`ClientError::Superseded`].
    #[instrument(skip(self))]
    pub async fn poll_for_results(
        &self,
        picker_session_id: &str,
    ) -> Result<Vec<MediaItem>, ClientError> {
        let session_id = self.require_session()?;
        let (generation, cancel) = {
            let inner = self.inner();
            self.set_state(ClientState::Polling {
                picker_session_id: picker_session_id.to_string(),
            });
            (inner.generation, inner.cancel.clone())
        };

        let result = self
            .collect_results(&session_id, picker_session_id, &cancel)
            .await;

        // Held while publishing so a concurrent sign-out cannot interleave.
        let inner = self.inner();
        if inner.generation != generation {
            return Err(ClientError::Superseded);
        }

        match result {
            Ok(media_items) => {
                info!(count = media_items.len(), "Picked media ready");
                self.set_state(ClientState::ResultsReady {
                    media_items: media_items.clone(),
                });
                Ok(media_items)
            }
            Err(err) => {
                warn!(error = %err, "Picking did not complete");
                self.set_state(ClientState::SignedIn);
                Err(err)
            }
        }
    }

    async fn collect_results(
        &self,
        session_id: &str,
        picker_session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<MediaItem>, ClientError> {
        let api = &self.api;
        poll_until(&self.policy, cancel, || async move {
            let status = api.poll_picker_session(session_id, picker_session_id).await?;
            Ok(status.completed.then_some(()))
        })
        .await?;

        let mut media_items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Superseded);
            }
            let page = api
                .fetch_selected_media(session_id, picker_session_id, page_token.as_deref())
                .await?;
            media_items.extend(page.media_items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(media_items)
    }

    /// Open a picker and wait for its results.
    pub async fn pick_media(&self) -> Result<Vec<MediaItem>, ClientError> {
        let picker = self.open_picker().await?;
        self.poll_for_results(&picker.picker_session_id).await
    }

    pub async fn list_drive_files(
        &self,
        request: &ListDriveFilesRequest,
    ) -> Result<DriveFileList, ClientError> {
        let session_id = self.require_session()?;
        self.api.list_drive_files(&session_id, request).await
    }

    /// Forget the session and all derived state, cancelling any running poll.
    #[instrument(skip(self))]
    pub fn sign_out(&self) -> Result<(), ClientError> {
        {
            let mut inner = self.inner();
            inner.invalidate();
            inner.session_id = None;
            self.set_state(ClientState::SignedOut);
        }
        self.store.clear()?;
        info!("Signed out");
        Ok(())
    }
}
