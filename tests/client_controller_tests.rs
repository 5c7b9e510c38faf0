//! Client Controller state machine against in-process fakes.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use picker_proxy::client::{
    BackendApi, BackoffPolicy, ClientController, ClientError, ClientState, Launcher,
    MemorySessionIdStore, PollError, SessionIdStore,
};
use picker_proxy::models::{
    DriveFileList, MediaItem, MediaItemsResponse, OAuthUrlResponse, PickerPollResponse,
    PickerSessionResponse, Platform,
};
use picker_proxy::proxy::ListDriveFilesRequest;

#[derive(Default)]
struct BackendState {
    /// `verify` answers true once this many calls have been made (0 = never).
    verify_true_after: AtomicU32,
    verify_calls: AtomicU32,
    authenticated: AtomicBool,
    /// `poll` reports completion on this call number (0 = never).
    complete_on_poll: AtomicU32,
    poll_calls: AtomicU32,
    result_calls: AtomicU32,
}

#[derive(Clone, Default)]
struct FakeBackend(Arc<BackendState>);

fn media_item(id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        base_url: Some(format!("https://lh3.googleusercontent.com/{id}")),
        mime_type: Some("image/jpeg".to_string()),
        filename: Some(format!("{id}.jpg")),
        width: Some(100),
        height: Some(100),
        create_time: None,
        kind: Some("PHOTO".to_string()),
        proxy_url: Some(format!("http://localhost:3000/api/picker/image/s/{id}")),
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn oauth_url(&self, platform: Platform) -> Result<OAuthUrlResponse, ClientError> {
        Ok(OAuthUrlResponse {
            oauth_url: format!("https://accounts.example.com/auth?platform={platform}"),
            session_id: "s-new".to_string(),
        })
    }

    async fn verify(&self, _session_id: &str) -> Result<bool, ClientError> {
        let calls = self.0.verify_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let threshold = self.0.verify_true_after.load(Ordering::SeqCst);
        Ok(self.0.authenticated.load(Ordering::SeqCst) || (threshold > 0 && calls >= threshold))
    }

    async fn create_picker_session(
        &self,
        _session_id: &str,
    ) -> Result<PickerSessionResponse, ClientError> {
        Ok(PickerSessionResponse {
            picker_uri: "https://photos.google.com/picker/p-1".to_string(),
            session_id: "p-1".to_string(),
            picker_session_id: "p-1".to_string(),
            poll_interval: None,
            timeout_in: None,
        })
    }

    async fn poll_picker_session(
        &self,
        _session_id: &str,
        _picker_session_id: &str,
    ) -> Result<PickerPollResponse, ClientError> {
        let calls = self.0.poll_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let target = self.0.complete_on_poll.load(Ordering::SeqCst);
        let completed = target > 0 && calls >= target;
        Ok(PickerPollResponse {
            completed,
            media_items_set: completed,
        })
    }

    async fn fetch_selected_media(
        &self,
        _session_id: &str,
        _picker_session_id: &str,
        page_token: Option<&str>,
    ) -> Result<MediaItemsResponse, ClientError> {
        self.0.result_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match page_token {
            None => MediaItemsResponse {
                media_items: vec![media_item("a"), media_item("b")],
                next_page_token: Some("p2".to_string()),
            },
            Some(_) => MediaItemsResponse {
                media_items: vec![media_item("c")],
                next_page_token: None,
            },
        })
    }

    async fn list_drive_files(
        &self,
        _session_id: &str,
        _request: &ListDriveFilesRequest,
    ) -> Result<DriveFileList, ClientError> {
        Ok(DriveFileList {
            files: Vec::new(),
            next_page_token: None,
        })
    }
}

#[derive(Clone, Default)]
struct RecordingLauncher(Arc<Mutex<Vec<String>>>);

impl RecordingLauncher {
    fn opened(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        self.0.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

type Controller = ClientController<FakeBackend, Arc<MemorySessionIdStore>, RecordingLauncher>;

struct Harness {
    controller: Arc<Controller>,
    backend: FakeBackend,
    store: Arc<MemorySessionIdStore>,
    launcher: RecordingLauncher,
}

fn harness(store: MemorySessionIdStore) -> Harness {
    let backend = FakeBackend::default();
    let store = Arc::new(store);
    let launcher = RecordingLauncher::default();
    let controller = ClientController::new(
        backend.clone(),
        store.clone(),
        launcher.clone(),
        Platform::Android,
    );
    Harness {
        controller: Arc::new(controller),
        backend,
        store,
        launcher,
    }
}

fn signed_in_harness() -> Harness {
    let h = harness(MemorySessionIdStore::with_session("s-1"));
    h.backend.0.authenticated.store(true, Ordering::SeqCst);
    h
}

#[tokio::test]
async fn restore_signs_in_with_valid_session() {
    let h = signed_in_harness();

    assert!(h.controller.restore().await.unwrap());
    assert_eq!(h.controller.state(), ClientState::SignedIn);
    assert_eq!(h.controller.session_id().as_deref(), Some("s-1"));
}

#[tokio::test]
async fn restore_discards_stale_session() {
    let h = harness(MemorySessionIdStore::with_session("s-stale"));

    assert!(!h.controller.restore().await.unwrap());
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.store.load().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn sign_in_completes_by_polling_verify() {
    let h = harness(MemorySessionIdStore::default());
    h.backend.0.verify_true_after.store(3, Ordering::SeqCst);

    let session_id = h.controller.sign_in().await.unwrap();

    assert_eq!(session_id, "s-new");
    assert_eq!(h.controller.state(), ClientState::SignedIn);
    assert_eq!(h.store.load().unwrap().as_deref(), Some("s-new"));
    assert_eq!(h.backend.0.verify_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        h.launcher.opened(),
        vec!["https://accounts.example.com/auth?platform=android".to_string()]
    );
}

#[tokio::test]
async fn duplicate_callbacks_apply_once() {
    let h = harness(MemorySessionIdStore::default());
    h.controller.begin_sign_in().await.unwrap();
    assert_eq!(h.controller.state(), ClientState::SigningIn);

    let deep_link = "mediapicker://oauth-callback?sessionId=s-new&success=true";
    assert!(h.controller.handle_callback_url(deep_link).unwrap());
    assert!(
        !h.controller
            .handle_callback_url("http://localhost:8081/oauth-callback?sessionId=s-new&success=true")
            .unwrap()
    );

    assert_eq!(h.controller.state(), ClientState::SignedIn);
    assert_eq!(h.store.load().unwrap().as_deref(), Some("s-new"));
}

#[tokio::test(start_paused = true)]
async fn callback_on_another_channel_ends_verify_wait() {
    let h = harness(MemorySessionIdStore::default());
    let session_id = h.controller.begin_sign_in().await.unwrap();

    let controller = h.controller.clone();
    let waiter = tokio::spawn(async move { controller.await_sign_in(&session_id).await });
    tokio::task::yield_now().await;

    h.controller
        .handle_callback_url("mediapicker://oauth-callback?sessionId=s-new&success=true")
        .unwrap();

    waiter.await.unwrap().unwrap();
    assert_eq!(h.controller.state(), ClientState::SignedIn);
}

#[tokio::test]
async fn failed_callback_returns_to_signed_out() {
    let h = harness(MemorySessionIdStore::default());
    h.controller.begin_sign_in().await.unwrap();

    let err = h
        .controller
        .handle_callback_url("mediapicker://oauth-callback?error=access_denied")
        .unwrap_err();

    assert!(matches!(err, ClientError::SignInFailed(ref code) if code == "access_denied"));
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.store.load().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn pick_media_polls_then_fetches_every_page_once() {
    let h = signed_in_harness();
    h.backend.0.complete_on_poll.store(3, Ordering::SeqCst);
    h.controller.restore().await.unwrap();

    let items = h.controller.pick_media().await.unwrap();

    let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(h.backend.0.poll_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.backend.0.result_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.launcher.opened(),
        vec!["https://photos.google.com/picker/p-1".to_string()]
    );
    assert!(matches!(
        h.controller.state(),
        ClientState::ResultsReady { ref media_items } if media_items.len() == 3
    ));
}

#[tokio::test(start_paused = true)]
async fn sign_out_mid_poll_drops_results() {
    let h = signed_in_harness();
    h.controller.restore().await.unwrap();

    let mut states = h.controller.subscribe();
    let controller = h.controller.clone();
    let picking = tokio::spawn(async move { controller.pick_media().await });

    states
        .wait_for(|state| matches!(state, ClientState::Polling { .. }))
        .await
        .unwrap();
    h.controller.sign_out().unwrap();

    let result = picking.await.unwrap();
    assert!(matches!(result, Err(ClientError::Superseded)));
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.store.load().unwrap(), None);
    assert_eq!(h.backend.0.result_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn polling_gives_up_with_distinct_timeout() {
    let h = signed_in_harness();
    h.controller.restore().await.unwrap();

    let policy = BackoffPolicy {
        max_elapsed: Duration::from_secs(30),
        ..BackoffPolicy::default()
    };
    let controller = Arc::try_unwrap(h.controller)
        .ok()
        .unwrap()
        .with_backoff(policy);

    let err = controller.pick_media().await.unwrap_err();

    assert!(matches!(err, ClientError::Poll(PollError::TimedOut { .. })));
    assert_eq!(controller.state(), ClientState::SignedIn);
    assert_eq!(h.backend.0.result_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn picker_requires_sign_in() {
    let h = harness(MemorySessionIdStore::default());

    assert!(matches!(
        h.controller.open_picker().await,
        Err(ClientError::NotSignedIn)
    ));
    assert!(matches!(
        h.controller
            .list_drive_files(&ListDriveFilesRequest::default())
            .await,
        Err(ClientError::NotSignedIn)
    ));
}

#[tokio::test]
async fn late_callback_after_sign_out_is_ignored() {
    let h = harness(MemorySessionIdStore::default());
    h.controller.begin_sign_in().await.unwrap();
    assert!(
        h.controller
            .handle_callback_url("mediapicker://oauth-callback?sessionId=s-new&success=true")
            .unwrap()
    );

    h.controller.sign_out().unwrap();

    // The second completion channel reports the same sign-in afterwards.
    let applied = h
        .controller
        .handle_callback_url("http://localhost:8081/oauth-callback?sessionId=s-new&success=true")
        .unwrap();

    assert!(!applied);
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.controller.session_id(), None);
    assert_eq!(h.store.load().unwrap(), None);
}

#[tokio::test]
async fn callback_for_another_session_is_ignored() {
    let h = harness(MemorySessionIdStore::default());
    h.controller.begin_sign_in().await.unwrap();

    let applied = h
        .controller
        .handle_callback_url("mediapicker://oauth-callback?sessionId=s-other&success=true")
        .unwrap();

    assert!(!applied);
    assert_eq!(h.controller.state(), ClientState::SigningIn);
    assert_eq!(h.store.load().unwrap(), None);
}

#[tokio::test]
async fn callback_without_sign_in_attempt_is_ignored() {
    let h = harness(MemorySessionIdStore::default());

    assert!(
        !h.controller
            .handle_callback_url("mediapicker://oauth-callback?sessionId=s-new&success=true")
            .unwrap()
    );
    assert_eq!(h.controller.state(), ClientState::SignedOut);
}

#[tokio::test]
async fn adopt_session_requires_backend_confirmation() {
    let h = harness(MemorySessionIdStore::default());

    assert!(!h.controller.adopt_session("s-unknown").await.unwrap());
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.store.load().unwrap(), None);

    h.backend.0.authenticated.store(true, Ordering::SeqCst);
    assert!(h.controller.adopt_session("s-1").await.unwrap());
    assert_eq!(h.controller.state(), ClientState::SignedIn);
    assert_eq!(h.store.load().unwrap().as_deref(), Some("s-1"));
}

#[tokio::test(start_paused = true)]
async fn sign_out_after_polling_never_publishes_results() {
    let h = signed_in_harness();
    h.backend.0.complete_on_poll.store(2, Ordering::SeqCst);
    h.controller.restore().await.unwrap();

    let mut states = h.controller.subscribe();
    let controller = h.controller.clone();
    let picking = tokio::spawn(async move { controller.pick_media().await });

    states
        .wait_for(|state| matches!(state, ClientState::Polling { .. }))
        .await
        .unwrap();
    h.controller.sign_out().unwrap();

    assert!(matches!(
        picking.await.unwrap(),
        Err(ClientError::Superseded)
    ));
    assert_eq!(h.controller.state(), ClientState::SignedOut);
    assert_eq!(h.backend.0.result_calls.load(Ordering::SeqCst), 0);
}
