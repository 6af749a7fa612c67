//! High-level session: `WavePortal`.
//!
//! Wires the wallet session, contract client, reconciliation engine and
//! transaction controller together for one page/app lifetime. Everything runs
//! on one thread; shared state lives in `Rc<RefCell<_>>` and no borrow is held
//! across an await.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use futures_util::StreamExt;

use crate::contract::{
    ContractClient, LiveEvent, LiveTransport, WaveContract, WaveReceipt, WaveSubscription,
};
use crate::domain::transaction::{TransactionController, TransactionState};
use crate::domain::wave::reconcile::{self, LiveOutcome, ReconciliationEngine, SnapshotOutcome};
use crate::domain::wave::{MessageStore, Wave};
use crate::error::{ContractError, SdkError, TransactionError, WalletError};
use crate::network;
use crate::shared::{Account, ObserverId};
use crate::wallet::{WalletCapability, WalletSession};

/// Result of one [`WavePortal::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pumped {
    /// A live wave was merged (or recognised as a duplicate).
    Wave(LiveOutcome),
    /// The feed reported a gap and a bulk reload ran.
    Resynced(SnapshotOutcome),
    /// No live feed: not started, shut down, or the transport gave up.
    Ended,
}

/// One Wave Portal session.
pub struct WavePortal<W> {
    wallet: WalletSession<W>,
    contract: Option<ContractClient<W>>,
    feed: Rc<RefCell<ReconciliationEngine>>,
    transactions: TransactionController,
    subscription: RefCell<Option<WaveSubscription>>,
    closed: Cell<bool>,
}

impl WavePortal<()> {
    pub fn builder() -> WavePortalBuilder {
        WavePortalBuilder::default()
    }
}

impl<W> WavePortal<W>
where
    W: WalletCapability + Clone + 'static,
{
    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Silent wallet restore, initial bulk read, then open the live feed.
    ///
    /// Failures are logged; the session stays usable.
    pub async fn start(&self) {
        if self.closed.get() {
            tracing::warn!("start() called on a closed session");
            return;
        }

        match self.wallet.restore().await {
            Ok(Some(account)) => tracing::debug!(%account, "Session restored"),
            Ok(None) => {}
            Err(WalletError::Unavailable) => {
                tracing::info!("Make sure you have a wallet installed");
            }
            Err(e) => tracing::warn!("Wallet restore failed: {}", e),
        }

        let Some(contract) = self.contract.as_ref() else {
            return;
        };

        // subscribe before the first read so nothing emitted in between is lost
        if self.subscription.borrow().is_none() {
            let subscription = contract.subscribe().await;
            if self.closed.get() {
                return;
            }
            let mut slot = self.subscription.borrow_mut();
            if slot.is_none() {
                *slot = Some(subscription);
            }
        }

        if let Err(e) = reconcile::refresh(&self.feed, contract).await {
            tracing::warn!("Initial wave read failed: {}", e);
        }
    }

    /// Dispose the live feed. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(mut subscription) = self.subscription.borrow_mut().take() {
            subscription.dispose();
        }
        tracing::info!("Wave Portal session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    // ── Wallet ───────────────────────────────────────────────────────────

    pub async fn connect_wallet(&self) -> Result<Account, WalletError> {
        self.wallet.connect().await
    }

    pub fn disconnect_wallet(&self) {
        self.wallet.disconnect();
    }

    pub fn current_account(&self) -> Option<Account> {
        self.wallet.current_account()
    }

    pub fn wallet(&self) -> &WalletSession<W> {
        &self.wallet
    }

    // ── Feed ─────────────────────────────────────────────────────────────

    /// Reload every wave from the contract.
    pub async fn refresh(&self) -> Result<SnapshotOutcome, ContractError> {
        let contract = self.contract()?;
        reconcile::refresh(&self.feed, contract).await
    }

    /// Wait for the next live event and merge it.
    pub async fn pump(&self) -> Result<Pumped, ContractError> {
        // taken out so the RefCell is not borrowed across the await
        let Some(mut subscription) = self.subscription.borrow_mut().take() else {
            return Ok(Pumped::Ended);
        };
        let event = subscription.next().await;

        if self.closed.get() {
            subscription.dispose();
            return Ok(Pumped::Ended);
        }

        match event {
            Some(LiveEvent::Wave(wave)) => {
                *self.subscription.borrow_mut() = Some(subscription);
                let outcome = self.feed.borrow_mut().apply_live(wave);
                Ok(Pumped::Wave(outcome))
            }
            Some(LiveEvent::Lagged) => {
                *self.subscription.borrow_mut() = Some(subscription);
                tracing::info!("Live feed lagged, reloading waves");
                self.refresh().await.map(Pumped::Resynced)
            }
            None => {
                tracing::warn!("Live wave feed ended");
                subscription.dispose();
                Ok(Pumped::Ended)
            }
        }
    }

    /// Current contents of the feed, in display order.
    pub fn messages(&self) -> Vec<Wave> {
        self.feed.borrow().store().records().to_vec()
    }

    /// Run `f` against the store without cloning it.
    pub fn with_messages<R>(&self, f: impl FnOnce(&MessageStore) -> R) -> R {
        f(self.feed.borrow().store())
    }

    /// Called after every change to the feed.
    ///
    /// The callback gets the store itself and must not call back into the
    /// session's feed methods.
    pub fn on_messages_changed(
        &self,
        callback: impl FnMut(&MessageStore) + 'static,
    ) -> ObserverId {
        self.feed.borrow_mut().on_change(callback)
    }

    pub fn remove_messages_observer(&self, id: ObserverId) -> bool {
        self.feed.borrow_mut().remove_observer(id)
    }

    pub async fn total_waves(&self) -> Result<u64, ContractError> {
        self.contract()?.total_waves().await
    }

    // ── Transactions ─────────────────────────────────────────────────────

    /// Submit a wave from the connected account and wait for it to be mined.
    pub async fn wave(&self, text: &str) -> Result<WaveReceipt, TransactionError> {
        let contract = self
            .contract
            .as_ref()
            .ok_or(TransactionError::WalletUnavailable)?;
        self.transactions
            .submit(&self.wallet, contract, &self.feed, text)
            .await
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transactions.state()
    }

    pub fn is_mining(&self) -> bool {
        self.transactions.is_mining()
    }

    /// A wave submission is running, including the reload after it is mined.
    pub fn is_busy(&self) -> bool {
        self.transactions.is_busy()
    }

    pub fn draft(&self) -> String {
        self.transactions.draft()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.transactions.set_draft(text);
    }

    pub fn on_transaction_state(
        &self,
        callback: impl FnMut(&TransactionState) + 'static,
    ) -> ObserverId {
        self.transactions.on_state_change(callback)
    }

    pub fn remove_transaction_observer(&self, id: ObserverId) -> bool {
        self.transactions.remove_observer(id)
    }

    fn contract(&self) -> Result<&ContractClient<W>, ContractError> {
        self.contract
            .as_ref()
            .ok_or(ContractError::WalletUnavailable)
    }
}

impl<W> Drop for WavePortal<W> {
    fn drop(&mut self) {
        if !self.closed.replace(true) {
            if let Some(mut subscription) = self.subscription.get_mut().take() {
                subscription.dispose();
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct WavePortalBuilder {
    contract_address: String,
    gas_limit: u64,
    poll_interval: Duration,
    confirmation_poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
    rpc_url: String,
    #[cfg_attr(not(feature = "ws-native"), allow(dead_code))]
    ws_url: Option<String>,
}

impl Default for WavePortalBuilder {
    fn default() -> Self {
        Self {
            contract_address: network::WAVE_PORTAL_ADDRESS.to_string(),
            gas_limit: network::DEFAULT_GAS_LIMIT,
            poll_interval: network::DEFAULT_POLL_INTERVAL,
            confirmation_poll_interval: network::DEFAULT_CONFIRMATION_POLL_INTERVAL,
            confirmation_timeout: None,
            rpc_url: network::DEFAULT_RPC_URL.to_string(),
            ws_url: None,
        }
    }
}

impl WavePortalBuilder {
    pub fn contract_address(mut self, address: &str) -> Self {
        self.contract_address = address.to_string();
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// How often the log poller checks for new blocks.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn confirmation_poll_interval(mut self, interval: Duration) -> Self {
        self.confirmation_poll_interval = interval;
        self
    }

    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = Some(timeout);
        self
    }

    /// Node endpoint used by [`build_http`](Self::build_http).
    pub fn rpc_url(mut self, url: &str) -> Self {
        self.rpc_url = url.to_string();
        self
    }

    /// Deliver live waves over `eth_subscribe` instead of log polling.
    #[cfg(feature = "ws-native")]
    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = Some(url.to_string());
        self
    }

    fn live_transport(&self) -> LiveTransport {
        #[cfg(feature = "ws-native")]
        if let Some(url) = &self.ws_url {
            return LiveTransport::WebSocket(crate::ws::WsConfig::with_url(url.as_str()));
        }
        LiveTransport::Polling {
            interval: self.poll_interval,
        }
    }

    /// Build a session over `capability`. `None` means no wallet is installed:
    /// the session starts, but reads and submissions report `WalletUnavailable`.
    pub fn build<W>(self, capability: Option<W>) -> Result<WavePortal<W>, SdkError>
    where
        W: WalletCapability + Clone + 'static,
    {
        let address = Address::from_str(&self.contract_address).map_err(|e| {
            SdkError::Other(format!(
                "Invalid contract address {}: {}",
                self.contract_address, e
            ))
        })?;

        let contract = capability.clone().map(|wallet| {
            ContractClient::new(wallet, address)
                .with_live_transport(self.live_transport())
                .with_confirmation_poll_interval(self.confirmation_poll_interval)
                .with_confirmation_timeout(self.confirmation_timeout)
        });

        Ok(WavePortal {
            wallet: WalletSession::new(capability),
            contract,
            feed: Rc::new(RefCell::new(ReconciliationEngine::new())),
            transactions: TransactionController::new(self.gas_limit),
            subscription: RefCell::new(None),
            closed: Cell::new(false),
        })
    }

    /// Build a session that talks JSON-RPC to [`rpc_url`](Self::rpc_url),
    /// using the node's unlocked accounts as the wallet.
    #[cfg(feature = "http")]
    pub fn build_http(self) -> Result<WavePortal<crate::http::JsonRpcHttp>, SdkError> {
        let http = crate::http::JsonRpcHttp::new(&self.rpc_url)?;
        self.build(Some(http))
    }
}
