//! Wave Portal contract binding.
//!
//! [`WaveContract`] is the seam the rest of the SDK talks to; [`ContractClient`]
//! implements it over any [`WalletCapability`], encoding calls with the
//! `sol!` bindings in [`abi`].

pub mod abi;
pub mod poller;
pub mod subscription;
pub mod wire;

use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::SolCall;
use futures_util::future::{self, Either};

use crate::domain::wave::Wave;
use crate::error::{ContractError, RpcError};
use crate::network;
use crate::shared::{Account, TxHash};
use crate::wallet::WalletCapability;

pub use subscription::{LiveEvent, WaveSubscription};
use wire::{CallRequest, ReceiptResponse, TransactionRequest};

pub const METHOD_CALL: &str = "eth_call";
pub const METHOD_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const METHOD_GET_RECEIPT: &str = "eth_getTransactionReceipt";

/// A submitted `wave` transaction that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWave {
    pub tx_hash: TxHash,
    pub from: Account,
}

/// A mined, successful `wave` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Operations on the Wave Portal contract.
#[allow(async_fn_in_trait)]
pub trait WaveContract {
    /// Every stored wave, in contract order, at the latest block.
    async fn read_all(&self) -> Result<Vec<Wave>, ContractError>;

    /// Advisory wave count.
    async fn total_waves(&self) -> Result<u64, ContractError>;

    /// Send `wave(text)` from `from` with an explicit gas limit.
    async fn submit_wave(
        &self,
        from: &Account,
        text: &str,
        gas_limit: u64,
    ) -> Result<PendingWave, ContractError>;

    /// Wait until `pending` is mined.
    async fn await_confirmation(&self, pending: &PendingWave) -> Result<WaveReceipt, ContractError>;

    /// Open a live `NewWave` feed.
    ///
    /// The feed starts at the moment this call returns: every wave emitted
    /// afterwards is delivered, or covered by a [`LiveEvent::Lagged`].
    async fn subscribe(&self) -> WaveSubscription;
}

/// How live events reach a [`ContractClient`].
#[derive(Debug, Clone)]
pub enum LiveTransport {
    /// `eth_blockNumber` + `eth_getLogs` over the wallet capability.
    Polling { interval: Duration },
    /// `eth_subscribe("logs")` over a native WebSocket.
    #[cfg(feature = "ws-native")]
    WebSocket(crate::ws::WsConfig),
}

impl Default for LiveTransport {
    fn default() -> Self {
        LiveTransport::Polling {
            interval: network::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// [`WaveContract`] over a [`WalletCapability`].
#[derive(Debug, Clone)]
pub struct ContractClient<W> {
    wallet: W,
    address: Address,
    live: LiveTransport,
    confirmation_poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
}

impl<W> ContractClient<W>
where
    W: WalletCapability + Clone + 'static,
{
    pub fn new(wallet: W, address: Address) -> Self {
        Self {
            wallet,
            address,
            live: LiveTransport::default(),
            confirmation_poll_interval: network::DEFAULT_CONFIRMATION_POLL_INTERVAL,
            confirmation_timeout: None,
        }
    }

    pub fn with_live_transport(mut self, live: LiveTransport) -> Self {
        self.live = live;
        self
    }

    pub fn with_confirmation_poll_interval(mut self, interval: Duration) -> Self {
        self.confirmation_poll_interval = interval;
        self
    }

    /// Give up waiting for a receipt after `timeout`. Default: wait forever.
    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, ContractError> {
        let request = CallRequest {
            to: self.address,
            data: Bytes::from(call.abi_encode()),
        };
        let value = self
            .wallet
            .request(METHOD_CALL, serde_json::json!([request, "latest"]))
            .await?;
        let data: Bytes = serde_json::from_value(value)
            .map_err(|e| ContractError::Decode(format!("eth_call result: {}", e)))?;
        Ok(C::abi_decode_returns(&data, true)?)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptResponse>, ContractError> {
        let value = self
            .wallet
            .request(METHOD_GET_RECEIPT, serde_json::json!([tx_hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ContractError::Decode(format!("Receipt: {}", e)))
    }

    async fn poll_receipt(&self, tx_hash: TxHash) -> Result<WaveReceipt, ContractError> {
        let mut polls: u32 = 0;
        loop {
            if let Some(receipt) = self.receipt(tx_hash).await? {
                // `blockNumber` is null for receipts of pending transactions on some nodes
                if receipt.block_number.is_some() {
                    if !receipt.succeeded() {
                        return Err(ContractError::Reverted {
                            tx_hash: Some(tx_hash),
                            reason: "receipt status 0x0".to_string(),
                        });
                    }
                    return Ok(WaveReceipt {
                        tx_hash,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    });
                }
            }
            polls += 1;
            tracing::trace!(%tx_hash, polls, "Transaction not mined yet");
            futures_timer::Delay::new(self.confirmation_poll_interval).await;
        }
    }
}

impl<W> WaveContract for ContractClient<W>
where
    W: WalletCapability + Clone + 'static,
{
    async fn read_all(&self) -> Result<Vec<Wave>, ContractError> {
        let raw = self.call(abi::getAllWavesCall {}).await?._0;
        tracing::debug!(count = raw.len(), "Fetched all waves");
        raw.into_iter().map(Wave::try_from).collect()
    }

    async fn total_waves(&self) -> Result<u64, ContractError> {
        let total = self.call(abi::getTotalWavesCall {}).await?._0;
        u64::try_from(total)
            .map_err(|_| ContractError::Decode(format!("Wave count out of range: {}", total)))
    }

    async fn submit_wave(
        &self,
        from: &Account,
        text: &str,
        gas_limit: u64,
    ) -> Result<PendingWave, ContractError> {
        let from_address = from
            .to_address()
            .map_err(|e| ContractError::Decode(format!("Invalid account {}: {}", from, e)))?;
        let call = abi::waveCall {
            message: text.to_string(),
        };
        let tx = TransactionRequest {
            from: from_address,
            to: self.address,
            data: Bytes::from(call.abi_encode()),
            gas: gas_limit,
        };

        let value = self
            .wallet
            .request(METHOD_SEND_TRANSACTION, serde_json::json!([tx]))
            .await?;
        let hash: B256 = serde_json::from_value(value).map_err(|e| {
            ContractError::Rpc(RpcError::Decode(format!("Transaction hash: {}", e)))
        })?;

        let pending = PendingWave {
            tx_hash: TxHash(hash),
            from: from.clone(),
        };
        tracing::info!(tx_hash = %pending.tx_hash, "Mining");
        Ok(pending)
    }

    async fn await_confirmation(&self, pending: &PendingWave) -> Result<WaveReceipt, ContractError> {
        let wait = self.poll_receipt(pending.tx_hash);
        let receipt = match self.confirmation_timeout {
            None => wait.await?,
            Some(limit) => {
                futures_util::pin_mut!(wait);
                match future::select(wait, futures_timer::Delay::new(limit)).await {
                    Either::Left((result, _)) => result?,
                    Either::Right(_) => {
                        tracing::warn!(tx_hash = %pending.tx_hash, ?limit, "Confirmation timed out");
                        return Err(ContractError::ConfirmationTimeout(pending.tx_hash));
                    }
                }
            }
        };
        tracing::info!(tx_hash = %receipt.tx_hash, block = ?receipt.block_number, "Mined");
        Ok(receipt)
    }

    async fn subscribe(&self) -> WaveSubscription {
        match &self.live {
            LiveTransport::Polling { interval } => {
                let from_block = match poller::block_number(&self.wallet).await {
                    Ok(head) => Some(head + 1),
                    Err(e) => {
                        tracing::warn!("Could not pin the wave feed start block: {}", e);
                        None
                    }
                };
                tracing::debug!(?interval, ?from_block, "Opening polled wave subscription");
                WaveSubscription::new(poller::poll_new_waves(
                    self.wallet.clone(),
                    self.address,
                    from_block,
                    *interval,
                ))
            }
            #[cfg(feature = "ws-native")]
            LiveTransport::WebSocket(config) => {
                tracing::debug!(url = %config.url, "Opening WebSocket wave subscription");
                WaveSubscription::new(ws_live::stream_new_waves(config.clone(), self.address))
            }
        }
    }
}

#[cfg(feature = "ws-native")]
mod ws_live {
    use alloy_primitives::Address;
    use alloy_sol_types::SolEvent;
    use futures_util::stream::Stream;
    use futures_util::StreamExt;

    use super::abi;
    use super::subscription::LiveEvent;
    use crate::domain::wave::wire::LogFilter;
    use crate::ws::native::WsClient;
    use crate::ws::{SubscribeParams, WsConfig, WsEvent};

    /// `NewWave` logs over `eth_subscribe`.
    ///
    /// The socket is opened before this returns. Logs emitted before the
    /// node acknowledges the subscription are not delivered, so every
    /// acknowledgement (the first one and each one after a reconnect) yields
    /// [`LiveEvent::Lagged`].
    pub(super) fn stream_new_waves(
        config: WsConfig,
        address: Address,
    ) -> impl Stream<Item = LiveEvent> {
        let mut client = WsClient::new(config);
        let filter = LogFilter::new(address, abi::NewWave::SIGNATURE_HASH);
        let opened = client
            .connect()
            .and_then(|()| client.subscribe(SubscribeParams::Logs(filter)));
        let mut events = match opened {
            Ok(()) => Some(client.into_events()),
            Err(e) => {
                tracing::error!("Could not open wave subscription: {}", e);
                None
            }
        };

        async_stream::stream! {
            while let Some(event) = match events.as_mut() {
                Some(events) => events.next().await,
                None => None,
            } {
                match event {
                    WsEvent::Subscribed { subscription, .. } => {
                        tracing::debug!(%subscription, "Wave subscription acknowledged");
                        yield LiveEvent::Lagged;
                    }
                    WsEvent::Log { log, .. } => {
                        if let Some(live) = LiveEvent::from_log(&log) {
                            yield live;
                        }
                    }
                    WsEvent::MaxReconnectReached => {
                        tracing::error!("Wave subscription gave up reconnecting");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
