//! Realtime session controller.
//!
//! One actor task owns the connection. The public [`RealtimeSession`] handle
//! sends it commands; the task `select!`s over those commands, the link (a
//! pending connect attempt or the open transport), the single reconnect
//! deadline and the liveness interval. Inbound frames are therefore handled
//! strictly one at a time, in arrival order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use walkie_core::account::AccountRefresh;
use walkie_core::attachment::PendingAttachment;
use walkie_core::config::ClientConfig;
use walkie_core::conversation::{AttachmentRef, SharedSessionStore, SessionStore, Turn, TurnRole};
use walkie_core::model_selection::ModelSelection;
use walkie_core::notification::Notifier;

use super::error::{
    ABORTED_TURN_TEXT, AUTH_FAILED_MESSAGE, CONNECTION_LOST_MESSAGE, NO_CHAT_MESSAGE,
    CAPTION_REQUIRED_MESSAGE, NO_MODEL_MESSAGE, PARSE_FAILED_MESSAGE, SendError,
};
use super::protocol::{InboundFrame, OutboundTurn, StreamChunk, classify};
use super::state::ConnectionState;
use super::transport::{Connector, Transport, TransportError};

/// Timing and endpoint settings of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub abort_reconnect_delay: Duration,
    pub liveness_window: Duration,
    pub liveness_check_interval: Duration,
    pub retry_on_auth_rejection: bool,
}

impl From<&ClientConfig> for RealtimeConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.realtime_url.clone(),
            reconnect_delay: config.reconnect_delay(),
            abort_reconnect_delay: config.abort_reconnect_delay(),
            liveness_window: config.liveness_window(),
            liveness_check_interval: config.liveness_check_interval(),
            retry_on_auth_rejection: config.retry_on_auth_rejection,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// A user turn to transmit.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub conversation_id: String,
    pub caption: String,
    pub model: ModelSelection,
    pub attachment: Option<PendingAttachment>,
}

enum Command {
    Connect(String),
    Send(SendRequest, oneshot::Sender<Result<(), SendError>>),
    Abort,
    Disconnect,
    Shutdown,
}

/// Handle to the controller task.
///
/// Cloning shares the same task. The task stops on [`shutdown`](Self::shutdown)
/// or when the last handle is dropped.
#[derive(Clone)]
pub struct RealtimeSession {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    streaming: watch::Receiver<bool>,
    _guard: Arc<DropGuard>,
}

impl RealtimeSession {
    /// Spawns the controller on the current tokio runtime.
    pub fn spawn(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        store: SharedSessionStore,
        notifier: Notifier,
        account: Arc<dyn AccountRefresh>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (streaming_tx, streaming_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let actor = Controller {
            config,
            connector,
            store,
            notifier,
            account,
            credential: None,
            link: Link::Idle,
            reconnect_at: None,
            last_keepalive: Instant::now(),
            state_tx,
            streaming_tx,
        };
        tokio::spawn(actor.run(commands_rx, cancel.clone()));

        Self {
            commands: commands_tx,
            state: state_rx,
            streaming: streaming_rx,
            _guard: Arc::new(cancel.drop_guard()),
        }
    }

    /// Starts connecting with `credential`. Idempotent for the credential
    /// already in use; a different one replaces the current connection.
    pub fn connect(&self, credential: impl Into<String>) {
        self.command(Command::Connect(credential.into()));
    }

    /// Appends the user turn and transmits it.
    pub async fn send(&self, request: SendRequest) -> Result<(), SendError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Send(request, reply_tx)).is_err() {
            return Err(SendError::Stopped);
        }
        reply_rx.await.unwrap_or(Err(SendError::Stopped))
    }

    /// Stops the in-flight turn. No-op unless a transport is open.
    pub fn abort(&self) {
        self.command(Command::Abort);
    }

    /// Closes the connection and forgets the credential (logout).
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Tears down and stops the task (unmount).
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_streaming(&self) -> bool {
        *self.streaming.borrow()
    }

    pub fn watch_streaming(&self) -> watch::Receiver<bool> {
        self.streaming.clone()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("[RealtimeSession] Controller already stopped");
        }
    }
}

type ConnectAttempt = BoxFuture<'static, Result<Box<dyn Transport>, TransportError>>;

/// What the controller currently holds. Each variant owns its resources, so
/// a second concurrent attempt cannot exist.
enum Link {
    Idle,
    Connecting(ConnectAttempt),
    AwaitingAuth(Box<dyn Transport>),
    Authenticated(Box<dyn Transport>),
    Disconnected,
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Link::Idle => ConnectionState::Idle,
            Link::Connecting(_) => ConnectionState::Connecting,
            Link::AwaitingAuth(_) => ConnectionState::AwaitingAuth,
            Link::Authenticated(_) => ConnectionState::Authenticated,
            Link::Disconnected => ConnectionState::Disconnected,
        }
    }

    fn transport(&mut self) -> Option<&mut Box<dyn Transport>> {
        match self {
            Link::AwaitingAuth(transport) | Link::Authenticated(transport) => Some(transport),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, Link::AwaitingAuth(_) | Link::Authenticated(_))
    }
}

enum LinkEvent {
    Opened(Result<Box<dyn Transport>, TransportError>),
    Frame(Option<Result<String, TransportError>>),
}

/// Resolves when the link produces something; pends forever when there is
/// nothing to poll.
async fn poll_link(link: &mut Link) -> LinkEvent {
    match link {
        Link::Connecting(attempt) => LinkEvent::Opened(attempt.await),
        Link::AwaitingAuth(transport) | Link::Authenticated(transport) => {
            LinkEvent::Frame(transport.next_frame().await)
        }
        Link::Idle | Link::Disconnected => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

enum ChunkOutcome {
    Started,
    Merged,
    Dropped,
}

struct Controller {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    store: SharedSessionStore,
    notifier: Notifier,
    account: Arc<dyn AccountRefresh>,
    credential: Option<String>,
    link: Link,
    /// The only reconnect timer.
    reconnect_at: Option<Instant>,
    last_keepalive: Instant,
    state_tx: watch::Sender<ConnectionState>,
    streaming_tx: watch::Sender<bool>,
}

impl Controller {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        let period = self.config.liveness_check_interval;
        let mut liveness = tokio::time::interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = poll_link(&mut self.link) => self.handle_link_event(event).await,
                _ = sleep_until(self.reconnect_at) => self.reconnect_due(),
                _ = liveness.tick() => self.check_liveness().await,
            }
        }

        self.teardown().await;
        tracing::debug!("[RealtimeSession] Controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(credential) => self.connect(credential).await,
            Command::Send(request, reply) => {
                let result = self.send(request).await;
                let _ = reply.send(result);
            }
            Command::Abort => self.abort().await,
            Command::Disconnect => self.teardown().await,
            Command::Shutdown => {}
        }
    }

    async fn connect(&mut self, credential: String) {
        let changed = self.credential.as_deref() != Some(credential.as_str());
        self.credential = Some(credential);
        match self.link {
            Link::Idle | Link::Disconnected => {
                self.reconnect_at = None;
                self.start_attempt();
            }
            // The live link belongs to the previous credential.
            _ if changed => {
                tracing::info!("[RealtimeSession] Credential changed, reconnecting");
                if let Some(transport) = self.link.transport() {
                    transport.close().await;
                }
                self.set_streaming(false);
                self.reconnect_at = None;
                self.start_attempt();
            }
            _ => tracing::debug!("[RealtimeSession] Connect ignored, already {}", self.link.state()),
        }
    }

    fn start_attempt(&mut self) {
        if self.credential.is_none() {
            self.set_link(Link::Idle);
            return;
        }
        let connector = self.connector.clone();
        let url = self.config.url.clone();
        tracing::info!("[RealtimeSession] Connecting to {}", url);
        self.set_link(Link::Connecting(Box::pin(async move {
            connector.connect(&url).await
        })));
    }

    fn reconnect_due(&mut self) {
        self.reconnect_at = None;
        if matches!(self.link, Link::Disconnected) {
            self.start_attempt();
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened(Ok(transport)) => self.on_opened(transport).await,
            LinkEvent::Opened(Err(e)) => {
                tracing::warn!("[RealtimeSession] {}", e);
                self.on_closed();
            }
            LinkEvent::Frame(Some(Ok(raw))) => self.on_frame(&raw).await,
            LinkEvent::Frame(Some(Err(e))) => {
                tracing::warn!("[RealtimeSession] {}", e);
                self.on_closed();
            }
            LinkEvent::Frame(None) => {
                tracing::info!("[RealtimeSession] Transport closed by peer");
                self.on_closed();
            }
        }
    }

    async fn on_opened(&mut self, mut transport: Box<dyn Transport>) {
        self.last_keepalive = Instant::now();
        let Some(credential) = self.credential.clone() else {
            transport.close().await;
            self.set_link(Link::Idle);
            return;
        };

        // The credential goes out raw, not as JSON.
        match transport.send_text(credential).await {
            Ok(()) => self.set_link(Link::AwaitingAuth(transport)),
            Err(e) => {
                tracing::warn!("[RealtimeSession] Failed to authenticate: {}", e);
                transport.close().await;
                self.on_closed();
            }
        }
    }

    /// The transport is gone without us asking: go to `Disconnected` and
    /// keep (or arm) the single reconnect timer.
    fn on_closed(&mut self) {
        self.set_link(Link::Disconnected);
        if self.reconnect_at.is_none() {
            self.schedule_reconnect(self.config.reconnect_delay);
        }
    }

    /// Closes the transport ourselves and reconnects after the normal delay.
    async fn drop_transport(&mut self) {
        if let Some(transport) = self.link.transport() {
            transport.close().await;
        }
        self.on_closed();
    }

    async fn on_frame(&mut self, raw: &str) {
        let frame = match classify(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("[RealtimeSession] {}", e);
                self.notifier.error(PARSE_FAILED_MESSAGE);
                self.set_streaming(false);
                self.drop_transport().await;
                self.refresh_account();
                return;
            }
        };

        match frame {
            InboundFrame::Keepalive => self.last_keepalive = Instant::now(),
            InboundFrame::AuthAccepted => {
                if !matches!(self.link, Link::AwaitingAuth(_)) {
                    return;
                }
                if let Link::AwaitingAuth(transport) = std::mem::replace(&mut self.link, Link::Idle) {
                    tracing::info!("[RealtimeSession] Authenticated");
                    self.set_link(Link::Authenticated(transport));
                }
            }
            InboundFrame::AuthRejected => self.on_auth_rejected().await,
            InboundFrame::Chunk(chunk) => self.on_chunk(chunk).await,
            InboundFrame::Done => {
                self.set_streaming(false);
                self.refresh_account();
            }
            InboundFrame::Rejected { message } => {
                self.notifier.error(message);
                self.set_streaming(false);
                self.drop_transport().await;
            }
            InboundFrame::ServerError { message } => {
                self.notifier.error(message);
                self.set_streaming(false);
                self.drop_transport().await;
                self.refresh_account();
            }
            InboundFrame::Ignored => {
                tracing::debug!("[RealtimeSession] Ignoring frame: {}", raw);
            }
        }
    }

    async fn on_auth_rejected(&mut self) {
        self.notifier.error(AUTH_FAILED_MESSAGE);
        if let Some(transport) = self.link.transport() {
            transport.close().await;
        }
        if self.config.retry_on_auth_rejection {
            self.on_closed();
        } else {
            tracing::info!("[RealtimeSession] Credential rejected, not retrying");
            self.credential = None;
            self.reconnect_at = None;
            self.set_link(Link::Idle);
        }
    }

    async fn on_chunk(&mut self, chunk: StreamChunk) {
        let outcome = self.store.update(move |store| merge_chunk(store, chunk)).await;
        match outcome {
            ChunkOutcome::Started => self.set_streaming(true),
            ChunkOutcome::Merged => {}
            ChunkOutcome::Dropped => {
                tracing::debug!("[RealtimeSession] Dropping chunk, no assistant turn to extend");
            }
        }
    }

    async fn send(&mut self, request: SendRequest) -> Result<(), SendError> {
        if !request.model.is_selected() {
            return Err(self.reject(NO_MODEL_MESSAGE));
        }
        let active_matches = {
            let store = self.store.read().await;
            store.active_id() == Some(request.conversation_id.as_str())
        };
        if !active_matches {
            return Err(self.reject(NO_CHAT_MESSAGE));
        }
        let attachment = request.attachment.as_ref();
        if attachment.is_some() && request.caption.trim().is_empty() {
            return Err(self.reject(CAPTION_REQUIRED_MESSAGE));
        }

        let content = match attachment {
            Some(_) => request.caption.trim(),
            None => request.caption.as_str(),
        };
        let frame = OutboundTurn::new(
            &request.conversation_id,
            content,
            request.model.provider,
            &request.model.model,
            attachment,
        )
        .to_frame()
        .map_err(|e| SendError::Encode(e.to_string()))?;

        let turn = Turn::user(content)
            .with_attachment(attachment.map(PendingAttachment::to_attachment_ref));
        self.store.update(|store| store.append_turn(turn)).await;

        let Some(transport) = self.link.transport() else {
            self.notifier.error(CONNECTION_LOST_MESSAGE);
            self.set_streaming(false);
            return Err(SendError::ConnectionLost);
        };
        let sent = transport.send_text(frame).await;
        if let Err(e) = sent {
            tracing::warn!("[RealtimeSession] {}", e);
            self.notifier.error(CONNECTION_LOST_MESSAGE);
            self.set_streaming(false);
            self.drop_transport().await;
            return Err(SendError::ConnectionLost);
        }

        tracing::debug!("[RealtimeSession] Sent turn to {}", request.conversation_id);
        self.set_streaming(true);
        Ok(())
    }

    fn reject(&self, message: &str) -> SendError {
        self.notifier.error(message);
        SendError::Precondition(message.to_string())
    }

    async fn abort(&mut self) {
        let Some(transport) = self.link.transport() else {
            tracing::debug!("[RealtimeSession] Abort ignored, no open transport");
            return;
        };
        transport.close().await;
        self.set_link(Link::Disconnected);

        self.store
            .update(|store| store.append_error_turn(ABORTED_TURN_TEXT))
            .await;
        self.set_streaming(false);
        self.schedule_reconnect(self.config.abort_reconnect_delay);
    }

    async fn check_liveness(&mut self) {
        if !self.link.is_open() {
            return;
        }
        let silent_for = self.last_keepalive.elapsed();
        if silent_for > self.config.liveness_window {
            tracing::info!(
                "[RealtimeSession] No keepalive for {:?}, reconnecting",
                silent_for
            );
            self.drop_transport().await;
        }
    }

    async fn teardown(&mut self) {
        self.credential = None;
        self.reconnect_at = None;
        if let Some(transport) = self.link.transport() {
            self.state_tx.send_replace(ConnectionState::Closing);
            transport.close().await;
        }
        self.set_link(Link::Idle);
        self.set_streaming(false);
    }

    fn refresh_account(&self) {
        let account = self.account.clone();
        tokio::spawn(async move { account.refresh_account().await });
    }

    fn set_link(&mut self, link: Link) {
        self.link = link;
        let state = self.link.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!("[RealtimeSession] {} -> {}", current, state);
            *current = state;
            true
        });
    }

    fn set_streaming(&self, streaming: bool) {
        self.streaming_tx.send_if_modified(|current| {
            let changed = *current != streaming;
            *current = streaming;
            changed
        });
    }
}

/// Applies one chunk to the active transcript.
///
/// After a user turn (or on an empty transcript) the chunk starts a new
/// assistant turn; after an assistant turn it is concatenated; after an
/// error turn it is dropped.
fn merge_chunk(store: &mut SessionStore, chunk: StreamChunk) -> ChunkOutcome {
    let timestamp = chunk.timestamp.unwrap_or(0);
    match store.last_turn().map(|turn| turn.role) {
        None | Some(TurnRole::User) => {
            let attachment = chunk.file.map(|url| AttachmentRef {
                url,
                file_name: chunk.file_name,
            });
            let turn = Turn::assistant(chunk.content)
                .with_timestamp(timestamp)
                .with_attachment(attachment);
            if store.append_turn(turn) {
                ChunkOutcome::Started
            } else {
                ChunkOutcome::Dropped
            }
        }
        Some(TurnRole::Assistant) => {
            let Some(last) = store.last_turn().cloned() else {
                return ChunkOutcome::Dropped;
            };
            let previous = last.attachment;
            let url = chunk
                .file
                .or_else(|| previous.as_ref().map(|a| a.url.clone()));
            let file_name = chunk
                .file_name
                .or_else(|| previous.and_then(|a| a.file_name));
            let merged = Turn::assistant(last.content + &chunk.content)
                .with_timestamp(timestamp)
                .with_attachment(url.map(|url| AttachmentRef { url, file_name }));
            store.merge_into_last_assistant_turn(merged);
            ChunkOutcome::Merged
        }
        Some(TurnRole::Error) => ChunkOutcome::Dropped,
    }
}
