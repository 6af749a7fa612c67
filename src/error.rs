//! Unified SDK error types.

use thiserror::Error;

use crate::shared::TxHash;

/// EIP-1193 "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 "the requested method and/or account has not been authorized".
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// JSON-RPC error code nodes use for `execution reverted`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Transport and provider failures.
#[derive(Error, Debug)]
pub enum RpcError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout")]
    Timeout,

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl RpcError {
    /// Whether the provider reported that the user declined the request.
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            RpcError::JsonRpc { code, .. } if *code == USER_REJECTED_CODE || *code == UNAUTHORIZED_CODE
        )
    }

    /// Whether the node refused the call because the contract reverted.
    pub fn is_revert(&self) -> bool {
        match self {
            RpcError::JsonRpc { code, message, .. } => {
                *code == EXECUTION_REVERTED_CODE || message.contains("execution reverted")
            }
            _ => false,
        }
    }
}

/// Wallet capability errors.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("No wallet capability available")]
    Unavailable,

    #[error("User rejected the authorization request")]
    UserRejected,

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("Wallet request failed: {0}")]
    Rpc(RpcError),
}

impl From<RpcError> for WalletError {
    fn from(e: RpcError) -> Self {
        if e.is_user_rejection() {
            WalletError::UserRejected
        } else {
            WalletError::Rpc(e)
        }
    }
}

/// Contract binding errors.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("User rejected the transaction")]
    UserRejected,

    #[error("RPC failure: {0}")]
    Rpc(RpcError),

    #[error("Transaction reverted{}: {reason}", tx_hash.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default())]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },

    #[error("Transaction {0} was not mined before the confirmation timeout")]
    ConfirmationTimeout(TxHash),

    #[error("ABI decode error: {0}")]
    Decode(String),

    #[error("Wallet unavailable")]
    WalletUnavailable,
}

impl From<RpcError> for ContractError {
    fn from(e: RpcError) -> Self {
        if e.is_user_rejection() {
            ContractError::UserRejected
        } else if e.is_revert() {
            let reason = match &e {
                RpcError::JsonRpc { message, .. } => message.clone(),
                other => other.to_string(),
            };
            ContractError::Reverted {
                tx_hash: None,
                reason,
            }
        } else {
            ContractError::Rpc(e)
        }
    }
}

impl From<alloy_sol_types::Error> for ContractError {
    fn from(e: alloy_sol_types::Error) -> Self {
        ContractError::Decode(e.to_string())
    }
}

/// Reasons a submission is refused before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("No wallet account connected")]
    NotConnected,
}

/// Transaction lifecycle errors, as reported by the controller.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("A wave is already being submitted")]
    AlreadyInFlight,

    #[error("Wallet unavailable")]
    WalletUnavailable,

    #[error("User rejected the transaction")]
    UserRejected,

    #[error("RPC failure: {0}")]
    Rpc(RpcError),

    #[error("Transaction reverted{}: {reason}", tx_hash.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default())]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },

    #[error("Transaction {0} was not mined before the confirmation timeout")]
    ConfirmationTimeout(TxHash),
}

impl From<ContractError> for TransactionError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::UserRejected => TransactionError::UserRejected,
            ContractError::Rpc(rpc) => TransactionError::Rpc(rpc),
            ContractError::Reverted { tx_hash, reason } => {
                TransactionError::Reverted { tx_hash, reason }
            }
            ContractError::ConfirmationTimeout(hash) => TransactionError::ConfirmationTimeout(hash),
            ContractError::Decode(msg) => TransactionError::Rpc(RpcError::Decode(msg)),
            ContractError::WalletUnavailable => TransactionError::WalletUnavailable,
        }
    }
}

/// WebSocket errors.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },
}
