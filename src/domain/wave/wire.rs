//! Wire types for wave events (`eth_getLogs` results and `eth_subscription`
//! notifications share the same log object).

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::shared::serde_util::opt_quantity;

/// An EVM log as returned by the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, with = "opt_quantity")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default, with = "opt_quantity")]
    pub log_index: Option<u64>,
    /// Set when a reorg dropped the log.
    #[serde(default)]
    pub removed: bool,
}

/// Log filter for `eth_getLogs` and `eth_subscribe("logs")`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_block: Option<String>,
}

impl LogFilter {
    pub fn new(address: Address, topic0: B256) -> Self {
        Self {
            address,
            topics: vec![topic0],
            from_block: None,
            to_block: None,
        }
    }

    /// Restrict to an inclusive block range.
    pub fn with_range(mut self, from: u64, to: u64) -> Self {
        self.from_block = Some(crate::shared::serde_util::format_quantity(from));
        self.to_block = Some(crate::shared::serde_util::format_quantity(to));
        self
    }
}
