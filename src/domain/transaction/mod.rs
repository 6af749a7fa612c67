//! Transaction domain: the lifecycle of one outgoing wave.

pub mod controller;

use serde::Serialize;

use crate::error::TransactionError;
use crate::shared::TxHash;

pub use controller::TransactionController;

/// Where the current submission stands.
///
/// `Confirmed` and `Failed` are momentary: observers see them, then the
/// controller settles back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransactionState {
    #[default]
    Idle,
    /// Waiting for the wallet to sign and broadcast.
    Submitting,
    /// Broadcast, waiting to be mined.
    AwaitingConfirmation { tx_hash: TxHash },
    Confirmed {
        tx_hash: TxHash,
        block_number: Option<u64>,
    },
    Failed { kind: FailureKind, message: String },
}

impl TransactionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransactionState::Idle)
    }

    /// Submitting or awaiting confirmation.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransactionState::Submitting | TransactionState::AwaitingConfirmation { .. }
        )
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TransactionState::AwaitingConfirmation { tx_hash }
            | TransactionState::Confirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Failure category reported in [`TransactionState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    WalletUnavailable,
    UserRejected,
    Rpc,
    Reverted,
    ConfirmationTimeout,
}

impl FailureKind {
    /// `None` for errors that never leave `Idle` (validation, re-entry).
    pub fn of(error: &TransactionError) -> Option<Self> {
        match error {
            TransactionError::Validation(_) | TransactionError::AlreadyInFlight => None,
            TransactionError::WalletUnavailable => Some(FailureKind::WalletUnavailable),
            TransactionError::UserRejected => Some(FailureKind::UserRejected),
            TransactionError::Rpc(_) => Some(FailureKind::Rpc),
            TransactionError::Reverted { .. } => Some(FailureKind::Reverted),
            TransactionError::ConfirmationTimeout(_) => Some(FailureKind::ConfirmationTimeout),
        }
    }
}
