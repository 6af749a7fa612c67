//! # Wave Portal SDK
//!
//! A Rust SDK for the Wave Portal contract: connect a wallet, read the shared
//! message log, follow new waves live and send your own.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core**: shared types, domain models and the reconciliation engine
//!    (always available, WASM-safe)
//! 2. **Wallet**: the EIP-1193 capability trait and the account session
//! 3. **Contract**: `sol!` bindings, calls, receipts and live `NewWave` feeds
//! 4. **Transport**: JSON-RPC over HTTP with per-method retry policies, and
//!    native WebSocket `eth_subscribe`
//! 5. **High-Level Client**: `WavePortal`, one session wiring it all together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waveportal_sdk::prelude::*;
//!
//! let portal = WavePortal::builder()
//!     .rpc_url("http://127.0.0.1:8545")
//!     .build_http()?;
//!
//! portal.start().await;
//! portal.connect_wallet().await?;
//! portal.wave("gm").await?;
//!
//! for wave in portal.messages() {
//!     println!("{} waved: {}", wave.sender, wave.text);
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and helpers used across all modules.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Unified SDK error types.
pub mod error;

/// Network constants.
pub mod network;

// ── Layer 2: Wallet ──────────────────────────────────────────────────────────

/// Wallet capability and account session.
pub mod wallet;

// ── Layer 3: Contract ────────────────────────────────────────────────────────

/// Wave Portal contract binding and live feeds.
pub mod contract;

// ── Layer 4: Transport ───────────────────────────────────────────────────────

/// JSON-RPC HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

/// WebSocket client: `eth_subscribe` messages, subscriptions, events.
pub mod ws;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `WavePortal`, the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{Account, ObserverId, TxHash};

    // Domain types: waves
    pub use crate::domain::wave::{
        LiveOutcome, MessageStore, Provenance, ReconciliationEngine, SnapshotOutcome, Wave,
    };

    // Domain types: transactions
    pub use crate::domain::transaction::{FailureKind, TransactionController, TransactionState};

    // Wallet
    pub use crate::wallet::{WalletCapability, WalletSession};
    #[cfg(feature = "wasm-wallet")]
    pub use crate::wallet::injected::InjectedWallet;

    // Contract
    pub use crate::contract::{
        ContractClient, LiveEvent, LiveTransport, PendingWave, WaveContract, WaveReceipt,
        WaveSubscription,
    };

    // Errors
    pub use crate::error::{
        ContractError, RpcError, SdkError, TransactionError, ValidationError, WalletError,
    };

    // Network
    pub use crate::network::{DEFAULT_RPC_URL, DEFAULT_WS_URL, WAVE_PORTAL_ADDRESS};

    // HTTP client
    #[cfg(feature = "http")]
    pub use crate::http::{JsonRpcHttp, RetryConfig, RetryPolicy};

    // WebSocket types
    pub use crate::ws::{SubscribeParams, WsConfig, WsEvent};
    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::WsClient;

    // Session
    pub use crate::client::{Pumped, WavePortal, WavePortalBuilder};
}
