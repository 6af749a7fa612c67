//! Network constants for the Wave Portal SDK.

use std::time::Duration;

/// Deployed Wave Portal contract.
pub const WAVE_PORTAL_ADDRESS: &str = "0x2BA62934E96d6F35536351E1Cd58Ee270F51474b";

/// Default JSON-RPC endpoint (local dev node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default WebSocket endpoint (local dev node).
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8545";

/// Gas limit attached to every `wave` call.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// How often the log poller asks for new blocks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// How often a pending transaction's receipt is re-queried.
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(1);
