//! Live `NewWave` delivery by log polling.
//!
//! This is how browser providers implement contract event listeners: remember
//! the last block seen, and every tick ask for the logs in the blocks mined
//! since. It only needs the wallet capability, so it works on every target.

use std::time::Duration;

use alloy_primitives::Address;
use alloy_sol_types::SolEvent;
use futures_util::stream::Stream;

use super::abi;
use super::subscription::LiveEvent;
use crate::domain::wave::wire::{LogEntry, LogFilter};
use crate::error::RpcError;
use crate::shared::serde_util::parse_quantity;
use crate::wallet::WalletCapability;

pub const METHOD_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const METHOD_GET_LOGS: &str = "eth_getLogs";

/// Poll `wallet` for `NewWave` logs emitted by `address`, starting at
/// `from_block` (inclusive).
///
/// Without a start block the cursor is pinned at the head seen by the first
/// successful poll, and [`LiveEvent::Lagged`] is yielded first since earlier
/// blocks were not watched. A failed poll is logged and retried on the next
/// tick without advancing the cursor, so no block is skipped.
pub fn poll_new_waves<W>(
    wallet: W,
    address: Address,
    from_block: Option<u64>,
    interval: Duration,
) -> impl Stream<Item = LiveEvent>
where
    W: WalletCapability + 'static,
{
    async_stream::stream! {
        let mut next_block = from_block;
        let mut failures: u32 = 0;

        loop {
            let head = match block_number(&wallet).await {
                Ok(head) => head,
                Err(e) => {
                    failures += 1;
                    tracing::warn!(failures, "Wave poll failed: {}", e);
                    futures_timer::Delay::new(interval).await;
                    continue;
                }
            };

            let from = match next_block {
                Some(from) => from,
                None => {
                    tracing::info!(head, "Wave feed pinned late, reporting a gap");
                    next_block = Some(head);
                    yield LiveEvent::Lagged;
                    head
                }
            };
            if head >= from {
                match logs_in_range(&wallet, address, from, head).await {
                    Ok(logs) => {
                        if failures > 0 {
                            tracing::info!(failures, "Wave poll recovered");
                            failures = 0;
                        }
                        tracing::trace!(from, to = head, count = logs.len(), "Polled wave logs");
                        next_block = Some(head + 1);
                        for log in &logs {
                            if let Some(event) = LiveEvent::from_log(log) {
                                yield event;
                            }
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(failures, from, to = head, "Wave log query failed: {}", e);
                    }
                }
            }

            futures_timer::Delay::new(interval).await;
        }
    }
}

pub(super) async fn block_number<W: WalletCapability>(wallet: &W) -> Result<u64, RpcError> {
    let value = wallet
        .request(METHOD_BLOCK_NUMBER, serde_json::json!([]))
        .await?;
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("Block number is not a string: {}", value)))?;
    parse_quantity(s)
}

async fn logs_in_range<W: WalletCapability>(
    wallet: &W,
    address: Address,
    from: u64,
    to: u64,
) -> Result<Vec<LogEntry>, RpcError> {
    let filter = LogFilter::new(address, abi::NewWave::SIGNATURE_HASH).with_range(from, to);
    let params = serde_json::json!([filter]);
    let value = wallet.request(METHOD_GET_LOGS, params).await?;
    serde_json::from_value(value).map_err(|e| RpcError::Decode(format!("Invalid log list: {}", e)))
}
