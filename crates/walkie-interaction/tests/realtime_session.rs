//! End-to-end behavior of the realtime session against the in-memory backend.
//!
//! All tests run on a paused clock, so reconnect and liveness timers are
//! driven deterministically by `tokio::time::sleep`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use walkie_core::account::AccountRefresh;
use walkie_core::attachment::PendingAttachment;
use walkie_core::conversation::{Conversation, SessionStore, SharedSessionStore, TurnRole};
use walkie_core::model_selection::{ModelSelection, Provider};
use walkie_core::notification::{Notification, Notifier};
use walkie_interaction::realtime::error::{
    ABORTED_TURN_TEXT, AUTH_FAILED_MESSAGE, CAPTION_REQUIRED_MESSAGE, CONNECTION_LOST_MESSAGE,
    NO_CHAT_MESSAGE, NO_MODEL_MESSAGE, PARSE_FAILED_MESSAGE,
};
use walkie_interaction::realtime::memory::{MemoryListener, MemoryPeer, memory_pair};
use walkie_interaction::{ConnectionState, RealtimeConfig, RealtimeSession, SendError, SendRequest};

#[derive(Default)]
struct CountingRefresh(AtomicUsize);

impl CountingRefresh {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRefresh for CountingRefresh {
    async fn refresh_account(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    session: RealtimeSession,
    listener: MemoryListener,
    store: SharedSessionStore,
    notes: broadcast::Receiver<Notification>,
    refresh: Arc<CountingRefresh>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(RealtimeConfig {
            url: "mem://chat".to_string(),
            ..RealtimeConfig::default()
        })
    }

    fn with_config(config: RealtimeConfig) -> Self {
        let mut store = SessionStore::new();
        let mut chat = Conversation::new("c1", "Chat");
        chat.turns = Some(Vec::new());
        store.load_conversation_list(vec![chat.clone()]);
        store.set_active_conversation(Some(chat));
        let store = SharedSessionStore::from_store(store);

        let notifier = Notifier::new();
        let notes = notifier.subscribe();
        let refresh = Arc::new(CountingRefresh::default());
        let (connector, listener) = memory_pair();
        let session = RealtimeSession::spawn(
            config,
            Arc::new(connector),
            store.clone(),
            notifier,
            refresh.clone(),
        );

        Self {
            session,
            listener,
            store,
            notes,
            refresh,
        }
    }

    /// Connects and completes the credential handshake.
    async fn authenticate(&mut self) -> MemoryPeer {
        self.session.connect("secret-token");
        let mut peer = self.listener.accept().await.expect("no connection");
        assert_eq!(peer.recv().await.as_deref(), Some("secret-token"));
        peer.push("true");
        self.wait_for(ConnectionState::Authenticated).await;
        peer
    }

    async fn wait_for(&self, target: ConnectionState) {
        let mut rx = self.session.watch_state();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == target))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {target}"))
            .expect("controller stopped");
    }

    fn notifications(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(note) = self.notes.try_recv() {
            messages.push(note.message);
        }
        messages
    }

    async fn transcript(&self) -> Vec<(TurnRole, String)> {
        self.store
            .read()
            .await
            .active()
            .map(|c| {
                c.turns()
                    .iter()
                    .map(|t| (t.role, t.content.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn request(caption: &str) -> SendRequest {
    SendRequest {
        conversation_id: "c1".to_string(),
        caption: caption.to_string(),
        model: ModelSelection::new(Provider::Openai, "gpt-4o"),
        attachment: None,
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent() {
    let mut h = Harness::new();

    h.session.connect("secret-token");
    h.session.connect("secret-token");
    h.session.connect("secret-token");
    settle().await;
    assert_eq!(h.listener.attempts(), 1);

    let mut peer = h.listener.accept().await.unwrap();
    assert_eq!(peer.recv().await.as_deref(), Some("secret-token"));
    peer.push("true");
    h.wait_for(ConnectionState::Authenticated).await;

    h.session.connect("secret-token");
    settle().await;
    assert_eq!(h.listener.attempts(), 1);
    assert_eq!(h.session.state(), ConnectionState::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_new_credential_replaces_authenticated_connection() {
    let mut h = Harness::new();
    let mut old_peer = h.authenticate().await;

    h.session.connect("other-token");
    let mut peer = h.listener.accept().await.unwrap();

    assert_eq!(h.listener.attempts(), 2);
    assert_eq!(peer.recv().await.as_deref(), Some("other-token"));
    assert_eq!(old_peer.recv().await, None);

    peer.push("true");
    h.wait_for(ConnectionState::Authenticated).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_streamed_chunks_build_one_assistant_turn() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    h.session.send(request("Say hello")).await.unwrap();
    assert!(h.session.is_streaming());

    let sent: serde_json::Value = serde_json::from_str(&peer.recv().await.unwrap()).unwrap();
    assert_eq!(sent["chatid"], "c1");
    assert_eq!(sent["content"], "Say hello");
    assert_eq!(sent["provider"], "openai");
    assert_eq!(sent["model"], "gpt-4o");

    peer.push(r#"{"content":"Hel"}"#);
    peer.push(r#"{"content":"lo"}"#);
    peer.push(r#"{"content":" world"}"#);
    settle().await;
    assert!(h.session.is_streaming());

    peer.push(r#"{"content":"[DONE]"}"#);
    settle().await;

    assert_eq!(
        h.transcript().await,
        vec![
            (TurnRole::User, "Say hello".to_string()),
            (TurnRole::Assistant, "Hello world".to_string()),
        ]
    );
    assert!(!h.session.is_streaming());
    assert_eq!(h.refresh.count(), 1);
    assert!(h.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_keepalives_and_unknown_json_do_not_touch_transcript() {
    let mut h = Harness::new();
    let peer = h.authenticate().await;

    peer.push("connected");
    peer.push(r#"{"status":"typing"}"#);
    peer.push(r#"{"content":""}"#);
    settle().await;

    assert!(h.transcript().await.is_empty());
    assert_eq!(h.session.state(), ConnectionState::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_preconditions_reject_without_side_effects() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    let mut no_model = request("hi");
    no_model.model = ModelSelection::default();
    assert_eq!(
        h.session.send(no_model).await,
        Err(SendError::Precondition(NO_MODEL_MESSAGE.to_string()))
    );

    let mut wrong_chat = request("hi");
    wrong_chat.conversation_id = "other".to_string();
    assert_eq!(
        h.session.send(wrong_chat).await,
        Err(SendError::Precondition(NO_CHAT_MESSAGE.to_string()))
    );

    let mut uncaptioned = request("   ");
    uncaptioned.attachment = Some(PendingAttachment {
        url: "https://cdn/cat.png".to_string(),
        file_name: "cat.png".to_string(),
        mime_type: "image/png".to_string(),
    });
    assert_eq!(
        h.session.send(uncaptioned).await,
        Err(SendError::Precondition(CAPTION_REQUIRED_MESSAGE.to_string()))
    );

    assert_eq!(
        h.notifications(),
        vec![NO_MODEL_MESSAGE, NO_CHAT_MESSAGE, CAPTION_REQUIRED_MESSAGE]
    );
    assert!(h.transcript().await.is_empty());
    assert!(peer.try_recv().is_none());
    assert!(!h.session.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_attachment_caption_is_trimmed_and_forwarded() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    let mut with_file = request("  what is this?  ");
    with_file.attachment = Some(PendingAttachment {
        url: "https://cdn/doc.pdf".to_string(),
        file_name: "doc.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
    });
    h.session.send(with_file).await.unwrap();

    let sent: serde_json::Value = serde_json::from_str(&peer.recv().await.unwrap()).unwrap();
    assert_eq!(sent["content"], "what is this?");
    assert_eq!(sent["file"], "https://cdn/doc.pdf");
    assert_eq!(sent["file_type"], "application/pdf");

    let store = h.store.read().await;
    let turn = store.last_turn().unwrap();
    assert_eq!(turn.content, "what is this?");
    assert_eq!(turn.attachment.as_ref().unwrap().file_name.as_deref(), Some("doc.pdf"));
}

#[tokio::test(start_paused = true)]
async fn test_send_without_transport_keeps_user_turn() {
    let mut h = Harness::new();

    assert_eq!(h.session.send(request("hello?")).await, Err(SendError::ConnectionLost));

    assert_eq!(
        h.transcript().await,
        vec![(TurnRole::User, "hello?".to_string())]
    );
    assert_eq!(h.notifications(), vec![CONNECTION_LOST_MESSAGE]);
    assert!(!h.session.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_peer_close_schedules_exactly_one_reconnect() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    peer.close();
    h.wait_for(ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(h.listener.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(h.listener.attempts(), 2);

    let mut second = h.listener.accept().await.unwrap();
    assert_eq!(second.recv().await.as_deref(), Some("secret-token"));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_retries_after_delay() {
    let mut h = Harness::new();
    h.listener.refuse_connections(true);

    h.session.connect("secret-token");
    settle().await;
    assert_eq!(h.listener.attempts(), 1);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);

    h.listener.refuse_connections(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;
    assert_eq!(h.listener.attempts(), 2);
    assert!(h.listener.try_accept().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_silent_backend_is_dropped_by_liveness_check() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    // First check sees exactly one window of silence, which is tolerated.
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(h.listener.attempts(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(peer.recv().await, None);
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_keepalives_hold_the_connection() {
    let mut h = Harness::new();
    let peer = h.authenticate().await;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        peer.push("connected");
        settle().await;
    }

    assert_eq!(h.listener.attempts(), 1);
    assert_eq!(h.session.state(), ConnectionState::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_abort_appends_error_turn_and_recovers_quickly() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    h.session.send(request("long story")).await.unwrap();
    peer.recv().await.unwrap();
    peer.push(r#"{"content":"Once upon"}"#);
    settle().await;

    h.session.abort();
    settle().await;

    assert_eq!(
        h.transcript().await,
        vec![
            (TurnRole::User, "long story".to_string()),
            (TurnRole::Assistant, "Once upon".to_string()),
            (TurnRole::Error, ABORTED_TURN_TEXT.to_string()),
        ]
    );
    assert!(!h.session.is_streaming());
    assert_eq!(peer.recv().await, None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.listener.attempts(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_abort_without_transport_is_noop() {
    let h = Harness::new();
    h.session.abort();
    settle().await;
    assert!(h.transcript().await.is_empty());
    assert_eq!(h.session.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_notifies_and_stays_idle() {
    let mut h = Harness::new();
    h.session.connect("bad-token");
    let mut peer = h.listener.accept().await.unwrap();
    peer.recv().await.unwrap();

    peer.push("false");
    h.wait_for(ConnectionState::Idle).await;

    assert_eq!(h.notifications(), vec![AUTH_FAILED_MESSAGE]);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.listener.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_retries_when_configured() {
    let mut h = Harness::with_config(RealtimeConfig {
        url: "mem://chat".to_string(),
        retry_on_auth_rejection: true,
        ..RealtimeConfig::default()
    });
    h.session.connect("flaky-token");
    let mut peer = h.listener.accept().await.unwrap();
    peer.recv().await.unwrap();

    peer.push("false");
    h.wait_for(ConnectionState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_backend_failure_frame_closes_and_reconnects() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;
    h.session.send(request("hi")).await.unwrap();
    peer.recv().await.unwrap();

    peer.push(r#"{"success":false,"message":"Not enough credits"}"#);
    settle().await;

    assert_eq!(h.notifications(), vec!["Not enough credits"]);
    assert!(!h.session.is_streaming());
    assert_eq!(peer.recv().await, None);
    assert_eq!(h.refresh.count(), 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;
    assert_eq!(h.listener.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_error_type_frame_refreshes_account() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    peer.push(r#"{"type":"error","error":"Model unavailable"}"#);
    settle().await;

    assert_eq!(h.notifications(), vec!["Model unavailable"]);
    assert_eq!(h.refresh.count(), 1);
    assert_eq!(peer.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_fatal_for_the_turn() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;
    h.session.send(request("hi")).await.unwrap();
    peer.recv().await.unwrap();

    peer.push("{not json");
    settle().await;

    assert_eq!(h.notifications(), vec![PARSE_FAILED_MESSAGE]);
    assert!(!h.session.is_streaming());
    assert_eq!(h.refresh.count(), 1);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_reconnect() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    h.session.disconnect();
    h.wait_for(ConnectionState::Idle).await;
    assert_eq!(peer.recv().await, None);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.listener.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_controller() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    h.session.shutdown();
    assert_eq!(peer.recv().await, None);
    settle().await;

    assert_eq!(h.session.send(request("anyone?")).await, Err(SendError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_closes_the_connection() {
    let mut h = Harness::new();
    let mut peer = h.authenticate().await;

    drop(h.session);
    assert_eq!(peer.recv().await, None);
}
