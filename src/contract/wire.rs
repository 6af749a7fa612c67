//! JSON-RPC request and response shapes used by the contract client.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::shared::serde_util::{opt_quantity, quantity};

/// `eth_call` call object.
#[derive(Debug, Clone, Serialize)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
}

/// `eth_sendTransaction` transaction object.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    #[serde(with = "quantity")]
    pub gas: u64,
}

/// The fields of `eth_getTransactionReceipt` the client cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub transaction_hash: B256,
    #[serde(default, with = "opt_quantity")]
    pub block_number: Option<u64>,
    #[serde(default, with = "opt_quantity")]
    pub gas_used: Option<u64>,
    /// `0x1` success, `0x0` failure. Absent on pre-Byzantium chains.
    #[serde(default, with = "opt_quantity")]
    pub status: Option<u64>,
}

impl ReceiptResponse {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}
