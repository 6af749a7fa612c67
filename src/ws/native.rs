//! Native WebSocket client over `tokio-tungstenite`.
//!
//! Full implementation with:
//! - Background tokio task for connection management
//! - WS-level ping/pong health check
//! - Exponential backoff reconnection with jitter
//! - Subscription tracking + auto-resubscribe on reconnect
//! - Stream-based event delivery to consumer

use std::pin::Pin;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::wave::wire::LogEntry;
use crate::error::WsError;
use crate::ws::{
    MessageIn, MessageOut, ReadyState, SubscribeParams, SubscriptionTracker, WsConfig, WsEvent,
    METHOD_SUBSCRIPTION,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Subscribe(SubscribeParams),
    Unsubscribe(SubscribeParams),
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    NormalClose,
    PongTimeout,
    RateLimited,
    Error(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    subscriptions: SubscriptionTracker,
    next_request_id: u64,
    reconnect_attempts: u32,
    ready_state: Arc<AtomicU16>,
}

impl TaskState {
    fn emit(&self, event: WsEvent) {
        if self.event_tx.try_send(event).is_err() {
            tracing::warn!("WS event channel full or closed; event dropped");
        }
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }

    fn next_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Native WebSocket client using `tokio-tungstenite`.
///
/// Uses a background tokio task for connection management.
/// The public API communicates with it via mpsc channels.
pub struct WsClient {
    config: WsConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    event_rx: tokio::sync::Mutex<mpsc::Receiver<WsEvent>>,
    event_tx: mpsc::Sender<WsEvent>,
    task_handle: Option<JoinHandle<()>>,
    ready_state: Arc<AtomicU16>,
}

impl WsClient {
    /// Create a new WS client. Does not connect yet.
    pub fn new(config: WsConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            config,
            cmd_tx: None,
            event_rx: tokio::sync::Mutex::new(event_rx),
            event_tx,
            task_handle: None,
            ready_state: Arc::new(AtomicU16::new(ReadyState::Closed as u16)),
        }
    }

    /// Connect to the node.
    ///
    /// Spawns a background tokio task that manages the connection,
    /// ping/pong keepalive, reconnection, and subscription tracking.
    /// Must be called from within a tokio runtime.
    pub fn connect(&mut self) -> Result<(), WsError> {
        if self.cmd_tx.is_some() {
            return Ok(());
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        self.cmd_tx = Some(cmd_tx);
        self.ready_state
            .store(ReadyState::Connecting as u16, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            subscriptions: SubscriptionTracker::new(),
            next_request_id: 0,
            reconnect_attempts: 0,
            ready_state: Arc::clone(&self.ready_state),
        };

        let handle = tokio::spawn(run_task(state));
        self.task_handle = Some(handle);

        Ok(())
    }

    /// Disconnect from the node.
    ///
    /// Sends a graceful close to the background task and waits for it to finish.
    pub async fn disconnect(&mut self) -> Result<(), WsError> {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect).await;
        }

        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        self.ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, cmd: Command) -> Result<(), WsError> {
        match &self.cmd_tx {
            Some(tx) => tx.try_send(cmd).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            }),
            None => Err(WsError::NotConnected),
        }
    }

    /// Subscribe; the subscription survives reconnects.
    pub fn subscribe(&self, params: SubscribeParams) -> Result<(), WsError> {
        self.send(Command::Subscribe(params))
    }

    pub fn unsubscribe(&self, params: SubscribeParams) -> Result<(), WsError> {
        self.send(Command::Unsubscribe(params))
    }

    /// Whether the WebSocket is currently open.
    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }

    /// Get a stream of events from the WebSocket connection.
    ///
    /// The returned stream borrows `self`, so it must be dropped
    /// before calling `disconnect()`.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = WsEvent> + Send + '_>> {
        Box::pin(futures_util::stream::unfold(
            &self.event_rx,
            |rx| async move {
                let mut guard = rx.lock().await;
                guard.recv().await.map(|event| (event, rx))
            },
        ))
    }

    /// Like [`events`](Self::events), but the stream owns the client.
    /// Dropping the stream stops the background task.
    pub fn into_events(self) -> Pin<Box<dyn Stream<Item = WsEvent> + Send>> {
        Box::pin(futures_util::stream::unfold(self, |client| async move {
            let event = client.event_rx.lock().await.recv().await;
            event.map(|event| (event, client))
        }))
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        let (mut sink, stream) = match attempt_connect(&state.config.url).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("WebSocket connection failed: {}", e);
                state.emit(WsEvent::Error(format!("Connection failed: {}", e)));

                if state.should_reconnect() {
                    backoff_sleep(&mut state, false).await;
                    if !drain_commands(&mut state) {
                        return;
                    }
                    continue;
                } else {
                    state.emit(WsEvent::MaxReconnectReached);
                    return;
                }
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        state.reconnect_attempts = 0;
        state
            .ready_state
            .store(ReadyState::Open as u16, Ordering::SeqCst);
        state.emit(WsEvent::Connected);

        // ── 3. Resubscribe ───────────────────────────────────────────────
        state.subscriptions.reset_ids();
        resubscribe_all(&mut state, &mut sink).await;

        // ── 4. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 5. Post-disconnect decision ──────────────────────────────────
        state
            .ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);

        let rate_limited = match reason {
            DisconnectReason::UserRequested | DisconnectReason::NormalClose => return,
            DisconnectReason::RateLimited => true,
            DisconnectReason::PongTimeout | DisconnectReason::Error(_) => false,
        };

        if !state.should_reconnect() {
            state.emit(WsEvent::MaxReconnectReached);
            return;
        }
        state
            .ready_state
            .store(ReadyState::Connecting as u16, Ordering::SeqCst);
        backoff_sleep(&mut state, rate_limited).await;
        if !drain_commands(&mut state) {
            return;
        }
    }
}

/// The inner connected loop. Runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let ping_dur = Duration::from_millis(state.config.ping_interval_ms as u64);
    let pong_dur = Duration::from_millis(state.config.pong_timeout_ms as u64);

    let mut ping_interval = tokio::time::interval(ping_dur);
    ping_interval.reset(); // skip immediate first tick

    let mut pong_deadline: Option<tokio::time::Instant> = None;

    // Reset whenever a pong deadline is set; parked far out otherwise.
    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(state, text.as_ref());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                        pong_sleep.as_mut().reset(far_future);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        state.emit(WsEvent::Disconnected {
                            code: Some(code),
                            reason: reason.clone(),
                        });
                        return match code {
                            1000 => DisconnectReason::NormalClose,
                            1008 => DisconnectReason::RateLimited,
                            _ => DisconnectReason::Error(reason),
                        };
                    }
                    Some(Ok(_)) => {} // Binary, Frame: ignored
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        state.emit(WsEvent::Disconnected {
                            code: None,
                            reason: reason.clone(),
                        });
                        return DisconnectReason::Error(reason);
                    }
                    None => {
                        state.emit(WsEvent::Disconnected {
                            code: None,
                            reason: "Stream ended".into(),
                        });
                        return DisconnectReason::Error("Stream ended".into());
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe(params)) => {
                        if state.subscriptions.track(&params) {
                            send_subscribe(state, &mut sink, params).await;
                        }
                    }
                    Some(Command::Unsubscribe(params)) => {
                        if let Some(sub_id) = state.subscriptions.untrack(&params) {
                            let id = state.next_id();
                            if let Err(e) = send_msg(&mut sink, &MessageOut::Unsubscribe(sub_id), id).await {
                                tracing::warn!("Unsubscribe failed: {}", e);
                            }
                        }
                    }
                    Some(Command::Disconnect) => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                    None => {
                        // WsClient dropped
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Ping interval ─────────────────────────────────────────
            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new().into())).await {
                    tracing::warn!("Failed to send ping: {}", e);
                } else if pong_deadline.is_none() {
                    let deadline = tokio::time::Instant::now() + pong_dur;
                    pong_deadline = Some(deadline);
                    pong_sleep.as_mut().reset(deadline);
                }
            }

            // ── d) Pong timeout ──────────────────────────────────────────
            () = &mut pong_sleep, if pong_deadline.is_some() => {
                tracing::warn!(
                    "Pong timeout: no response within {}ms",
                    state.config.pong_timeout_ms
                );
                state.emit(WsEvent::Disconnected {
                    code: None,
                    reason: "Pong timeout".into(),
                });
                let _ = sink.close().await;
                return DisconnectReason::PongTimeout;
            }
        }
    }
}

// ─── Inbound handling ────────────────────────────────────────────────────────

fn handle_text(state: &mut TaskState, text: &str) {
    let msg = match serde_json::from_str::<MessageIn>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("WS deserialization error: {} (raw: {})", e, text);
            state.emit(WsEvent::Error(format!("Deserialization error: {}", e)));
            return;
        }
    };

    match msg {
        MessageIn::Notification(n) if n.method == METHOD_SUBSCRIPTION => {
            let subscription = n.params.subscription;
            match state.subscriptions.params_for(&subscription) {
                Some(SubscribeParams::Logs(_)) => {
                    match serde_json::from_value::<LogEntry>(n.params.result) {
                        Ok(log) => state.emit(WsEvent::Log { subscription, log }),
                        Err(e) => state.emit(WsEvent::Error(format!("Invalid log: {}", e))),
                    }
                }
                Some(SubscribeParams::NewHeads) => state.emit(WsEvent::NewHead {
                    subscription,
                    header: n.params.result,
                }),
                None => {
                    tracing::debug!("Notification for unknown subscription {}", subscription);
                }
            }
        }
        MessageIn::Notification(n) => {
            tracing::debug!("Ignoring notification {}", n.method);
        }
        MessageIn::Response(resp) => {
            if let Some(err) = resp.error {
                if let Some(params) = state.subscriptions.reject(resp.id) {
                    tracing::error!(
                        "Subscription {} refused: {}",
                        params.subscription_key(),
                        err.message
                    );
                }
                state.emit(WsEvent::Error(format!(
                    "JSON-RPC error {}: {}",
                    err.code, err.message
                )));
                return;
            }
            let sub_id = resp.result.as_ref().and_then(|r| r.as_str());
            if let Some(sub_id) = sub_id {
                if let Some(params) = state.subscriptions.confirm(resp.id, sub_id) {
                    tracing::info!("Subscribed to {} as {}", params.subscription_key(), sub_id);
                    state.emit(WsEvent::Subscribed {
                        params,
                        subscription: sub_id.to_string(),
                    });
                }
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish a WebSocket connection with a 30-second timeout.
async fn attempt_connect(url: &str) -> Result<(WsSink, SplitStream<WsStream>), String> {
    let (ws_stream, _) = tokio::time::timeout(Duration::from_secs(30), connect_async(url))
        .await
        .map_err(|_| "Connection timeout".to_string())?
        .map_err(|e| e.to_string())?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut WsSink, msg: &MessageOut, id: u64) -> Result<(), String> {
    let json = msg.to_json(id).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

async fn send_subscribe(state: &mut TaskState, sink: &mut WsSink, params: SubscribeParams) {
    let id = state.next_id();
    let msg = MessageOut::Subscribe(params.clone());
    match send_msg(sink, &msg, id).await {
        Ok(()) => state.subscriptions.mark_pending(id, params),
        Err(e) => tracing::warn!("Failed to subscribe to {}: {}", params.subscription_key(), e),
    }
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Subscription tracking ──────────────────────────────────────────────────

async fn resubscribe_all(state: &mut TaskState, sink: &mut WsSink) {
    if state.subscriptions.is_empty() {
        return;
    }
    tracing::info!(
        "Resubscribing to {} tracked subscription(s)",
        state.subscriptions.len()
    );
    let active = state.subscriptions.active().to_vec();
    for params in active {
        send_subscribe(state, sink, params).await;
    }
}

/// Apply commands that arrived while disconnected to the tracker.
/// Returns `false` if the client asked to disconnect.
fn drain_commands(state: &mut TaskState) -> bool {
    while let Ok(cmd) = state.cmd_rx.try_recv() {
        match cmd {
            Command::Subscribe(params) => {
                state.subscriptions.track(&params);
            }
            Command::Unsubscribe(params) => {
                state.subscriptions.untrack(&params);
            }
            Command::Disconnect => return false,
        }
    }
    true
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

async fn backoff_sleep(state: &mut TaskState, rate_limited: bool) {
    state.reconnect_attempts += 1;

    let exp = (state.reconnect_attempts - 1).min(10);
    let base = state
        .config
        .base_reconnect_delay_ms
        .saturating_mul(1u32 << exp);

    let (jitter_max, cap) = if rate_limited {
        (1000u32, 300_000u32) // up to 5 minutes for rate limits
    } else {
        (500u32, 60_000u32) // up to 60 seconds normally
    };

    let jitter = rand::random::<u32>() % jitter_max;
    let delay = base.saturating_add(jitter).min(cap);

    tracing::info!(
        "Reconnect attempt {}/{} in {}ms{}",
        state.reconnect_attempts,
        state.config.max_reconnect_attempts,
        delay,
        if rate_limited { " (rate-limited)" } else { "" }
    );

    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
