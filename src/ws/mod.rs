//! WebSocket layer: JSON-RPC `eth_subscribe` messages, subscriptions, events.
//!
//! The transport lives in `native.rs` (`ws-native` feature, `tokio-tungstenite`).
//! This module defines the message and event types, which are target-agnostic.

pub mod subscriptions;

#[cfg(feature = "ws-native")]
pub mod native;

use serde::Deserialize;

use crate::domain::wave::wire::LogEntry;
use crate::shared::jsonrpc::{JsonRpcErrorObject, JsonRpcRequest};

pub use subscriptions::{SubscribeParams, SubscriptionTracker};

pub const METHOD_SUBSCRIBE: &str = "eth_subscribe";
pub const METHOD_UNSUBSCRIBE: &str = "eth_unsubscribe";
pub const METHOD_SUBSCRIPTION: &str = "eth_subscription";

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to node.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOut {
    Subscribe(SubscribeParams),
    /// Cancel a subscription by the id the node assigned.
    Unsubscribe(String),
}

impl MessageOut {
    pub fn method(&self) -> &'static str {
        match self {
            MessageOut::Subscribe(_) => METHOD_SUBSCRIBE,
            MessageOut::Unsubscribe(_) => METHOD_UNSUBSCRIBE,
        }
    }

    /// Encode as a JSON-RPC request with the given id.
    pub fn to_json(&self, id: u64) -> Result<String, serde_json::Error> {
        let params = match self {
            MessageOut::Subscribe(params) => params.to_params()?,
            MessageOut::Unsubscribe(sub_id) => serde_json::json!([sub_id]),
        };
        serde_json::to_string(&JsonRpcRequest::new(id, self.method(), &params))
    }
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Raw inbound message from the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageIn {
    /// `eth_subscription` push.
    Notification(Notification),
    /// Answer to one of our requests.
    Response(Response),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub method: String,
    pub params: NotificationParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    pub subscription: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// High-level events emitted by the WS client to the consumer.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// A log delivered on a `logs` subscription.
    Log {
        subscription: String,
        log: LogEntry,
    },
    /// A new block header on a `newHeads` subscription.
    NewHead {
        subscription: String,
        header: serde_json::Value,
    },
    /// The node accepted a subscription.
    Subscribed {
        params: SubscribeParams,
        subscription: String,
    },
    /// Connection established (again, after a reconnect).
    Connected,
    /// Connection lost (may trigger reconnect).
    Disconnected { code: Option<u16>, reason: String },
    /// A deserialization or protocol error.
    Error(String),
    /// Gave up reconnecting.
    MaxReconnectReached,
}

/// Connection state, shared with the background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u16> for ReadyState {
    fn from(v: u16) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Configuration for the WS client.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay_ms: u32,
    pub ping_interval_ms: u32,
    pub pong_timeout_ms: u32,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            reconnect: true,
            max_reconnect_attempts: 10,
            base_reconnect_delay_ms: 1000,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
        }
    }
}

impl WsConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
