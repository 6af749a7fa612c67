//! Drives one wave submission: validate, sign, wait for the receipt, reload.

use std::cell::{Cell, RefCell};

use super::{FailureKind, TransactionState};
use crate::contract::{WaveContract, WaveReceipt};
use crate::domain::wave::reconcile::{self, ReconciliationEngine};
use crate::error::{TransactionError, ValidationError};
use crate::network::DEFAULT_GAS_LIMIT;
use crate::shared::{ObserverId, Observers};
use crate::wallet::{WalletCapability, WalletSession};

/// Owns the [`TransactionState`] and the draft message.
///
/// At most one submission is in flight, from validation until the final
/// return to `Idle` (the reload after `Confirmed` included). A failure is
/// reported as `Failed` and the controller returns to `Idle`; nothing is
/// retried.
#[derive(Debug)]
pub struct TransactionController {
    state: RefCell<TransactionState>,
    busy: Cell<bool>,
    draft: RefCell<String>,
    gas_limit: u64,
    observers: RefCell<Observers<TransactionState>>,
}

impl Default for TransactionController {
    fn default() -> Self {
        Self::new(DEFAULT_GAS_LIMIT)
    }
}

impl TransactionController {
    pub fn new(gas_limit: u64) -> Self {
        Self {
            state: RefCell::new(TransactionState::Idle),
            busy: Cell::new(false),
            draft: RefCell::new(String::new()),
            gas_limit,
            observers: RefCell::new(Observers::new()),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state.borrow().clone()
    }

    /// Busy indicator: a transaction is being signed or mined.
    pub fn is_mining(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    /// A `submit` call is running, in any state.
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Text of the last submission that has not been confirmed yet.
    pub fn draft(&self) -> String {
        self.draft.borrow().clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.borrow_mut() = text.into();
    }

    /// Observe every transition, including the momentary ones.
    ///
    /// Callbacks must not register or remove observers.
    pub fn on_state_change(
        &self,
        callback: impl FnMut(&TransactionState) + 'static,
    ) -> ObserverId {
        self.observers.borrow_mut().subscribe(callback)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.borrow_mut().unsubscribe(id)
    }

    /// Submit `text` as a wave from the connected account.
    ///
    /// Validation failures and re-entry leave the state untouched. Once the
    /// transaction is mined the feed is reloaded through `feed`; a failed
    /// reload is logged, not returned.
    pub async fn submit<W, C>(
        &self,
        wallet: &WalletSession<W>,
        contract: &C,
        feed: &RefCell<ReconciliationEngine>,
        text: &str,
    ) -> Result<WaveReceipt, TransactionError>
    where
        W: WalletCapability,
        C: WaveContract,
    {
        if self.busy.get() {
            return Err(TransactionError::AlreadyInFlight);
        }
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let account = wallet
            .current_account()
            .ok_or(ValidationError::NotConnected)?;
        let _busy = BusyGuard::hold(&self.busy);

        self.set_draft(text);
        self.transition(TransactionState::Submitting);

        let pending = match contract.submit_wave(&account, text, self.gas_limit).await {
            Ok(pending) => pending,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.transition(TransactionState::AwaitingConfirmation {
            tx_hash: pending.tx_hash,
        });

        let receipt = match contract.await_confirmation(&pending).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.draft.borrow_mut().clear();
        self.transition(TransactionState::Confirmed {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        });

        match reconcile::refresh(feed, contract).await {
            Ok(outcome) => tracing::debug!(?outcome, "Reloaded waves after confirmation"),
            Err(e) => tracing::warn!("Reload after confirmation failed: {}", e),
        }
        match contract.total_waves().await {
            Ok(total) => tracing::info!("Retrieved total wave count... {}", total),
            Err(e) => tracing::debug!("Could not read total wave count: {}", e),
        }

        self.transition(TransactionState::Idle);
        Ok(receipt)
    }

    fn fail(&self, error: TransactionError) -> TransactionError {
        let kind = FailureKind::of(&error).unwrap_or(FailureKind::Rpc);
        tracing::warn!(?kind, "Wave submission failed: {}", error);
        self.transition(TransactionState::Failed {
            kind,
            message: error.to_string(),
        });
        self.transition(TransactionState::Idle);
        error
    }

    fn transition(&self, next: TransactionState) {
        tracing::debug!(state = ?next, "Transaction state");
        *self.state.borrow_mut() = next.clone();
        self.observers.borrow_mut().notify(&next);
    }
}

/// Clears the busy flag on every exit path, including a dropped future.
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn hold(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{PendingWave, WaveSubscription};
    use crate::domain::wave::test_util::bulk;
    use crate::domain::wave::Wave;
    use crate::error::{ContractError, RpcError};
    use crate::shared::{Account, TxHash};
    use alloy_primitives::B256;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeWallet;

    impl WalletCapability for FakeWallet {
        async fn request(
            &self,
            _method: &str,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, RpcError> {
            Ok(serde_json::json!(["0xAA"]))
        }
    }

    async fn connected() -> WalletSession<FakeWallet> {
        let session = WalletSession::new(Some(FakeWallet));
        session.connect().await.unwrap();
        session
    }

    fn hash() -> TxHash {
        TxHash(B256::repeat_byte(0xab))
    }

    /// Contract double; each result is consumed once.
    #[derive(Default)]
    struct FakeContract {
        submit: RefCell<Option<Result<PendingWave, ContractError>>>,
        confirm: RefCell<Option<Result<WaveReceipt, ContractError>>>,
        gate: RefCell<Option<tokio::sync::oneshot::Receiver<()>>>,
        read_gate: RefCell<Option<tokio::sync::oneshot::Receiver<()>>>,
        chain: RefCell<Vec<Wave>>,
        submits: Cell<u32>,
        reads: Cell<u32>,
    }

    impl FakeContract {
        fn succeeding() -> Self {
            let contract = Self::default();
            *contract.submit.borrow_mut() = Some(Ok(PendingWave {
                tx_hash: hash(),
                from: Account::from("0xAA"),
            }));
            *contract.confirm.borrow_mut() = Some(Ok(WaveReceipt {
                tx_hash: hash(),
                block_number: Some(7),
                gas_used: Some(50_000),
            }));
            contract
        }
    }

    impl WaveContract for FakeContract {
        async fn read_all(&self) -> Result<Vec<Wave>, ContractError> {
            self.reads.set(self.reads.get() + 1);
            let gate = self.read_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(self.chain.borrow().clone())
        }

        async fn total_waves(&self) -> Result<u64, ContractError> {
            Ok(self.chain.borrow().len() as u64)
        }

        async fn submit_wave(
            &self,
            from: &Account,
            text: &str,
            _gas_limit: u64,
        ) -> Result<PendingWave, ContractError> {
            self.submits.set(self.submits.get() + 1);
            let result = self
                .submit
                .borrow_mut()
                .take()
                .unwrap_or(Err(ContractError::Rpc(RpcError::Timeout)));
            if result.is_ok() {
                self.chain.borrow_mut().push(bulk(from.as_str(), 300, text));
            }
            result
        }

        async fn await_confirmation(
            &self,
            _pending: &PendingWave,
        ) -> Result<WaveReceipt, ContractError> {
            let gate = self.gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.confirm
                .borrow_mut()
                .take()
                .unwrap_or(Err(ContractError::Rpc(RpcError::Timeout)))
        }

        async fn subscribe(&self) -> WaveSubscription {
            WaveSubscription::empty()
        }
    }

    fn record(controller: &TransactionController) -> Rc<RefCell<Vec<TransactionState>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        controller.on_state_change(move |s| sink.borrow_mut().push(s.clone()));
        seen
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let controller = TransactionController::default();
        let seen = record(&controller);
        let contract = FakeContract::succeeding();
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        for text in ["", "   \n"] {
            let result = controller.submit(&wallet, &contract, &feed, text).await;
            assert!(matches!(
                result,
                Err(TransactionError::Validation(ValidationError::EmptyMessage))
            ));
        }
        assert!(controller.state().is_idle());
        assert!(seen.borrow().is_empty());
        assert_eq!(contract.submits.get(), 0);
    }

    #[tokio::test]
    async fn test_not_connected_is_validation_error() {
        let controller = TransactionController::default();
        let contract = FakeContract::succeeding();
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = WalletSession::new(Some(FakeWallet));

        let result = controller.submit(&wallet, &contract, &feed, "gm").await;
        assert!(matches!(
            result,
            Err(TransactionError::Validation(ValidationError::NotConnected))
        ));
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn test_user_rejection_returns_to_idle() {
        let controller = TransactionController::default();
        let seen = record(&controller);
        let contract = FakeContract::default();
        *contract.submit.borrow_mut() = Some(Err(ContractError::UserRejected));
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let result = controller.submit(&wallet, &contract, &feed, "gm").await;
        assert!(matches!(result, Err(TransactionError::UserRejected)));
        assert!(controller.state().is_idle());

        let seen = seen.borrow();
        assert_eq!(seen[0], TransactionState::Submitting);
        assert!(matches!(
            seen[1],
            TransactionState::Failed {
                kind: FailureKind::UserRejected,
                ..
            }
        ));
        assert_eq!(seen[2], TransactionState::Idle);
    }

    #[tokio::test]
    async fn test_rpc_failure_keeps_draft() {
        let controller = TransactionController::default();
        let seen = record(&controller);
        let contract = FakeContract::default();
        *contract.submit.borrow_mut() = Some(Err(ContractError::Rpc(RpcError::Timeout)));
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let result = controller.submit(&wallet, &contract, &feed, "gm").await;
        assert!(matches!(result, Err(TransactionError::Rpc(_))));
        assert_eq!(controller.draft(), "gm");
        assert!(controller.state().is_idle());
        assert!(matches!(
            seen.borrow()[1],
            TransactionState::Failed {
                kind: FailureKind::Rpc,
                ..
            }
        ));
        assert_eq!(contract.submits.get(), 1);
    }

    #[tokio::test]
    async fn test_revert_after_broadcast() {
        let controller = TransactionController::default();
        let seen = record(&controller);
        let contract = FakeContract::succeeding();
        *contract.confirm.borrow_mut() = Some(Err(ContractError::Reverted {
            tx_hash: Some(hash()),
            reason: "receipt status 0x0".into(),
        }));
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let result = controller.submit(&wallet, &contract, &feed, "gm").await;
        assert!(matches!(result, Err(TransactionError::Reverted { .. })));

        let seen = seen.borrow();
        assert_eq!(
            seen[1],
            TransactionState::AwaitingConfirmation { tx_hash: hash() }
        );
        assert!(matches!(
            seen[2],
            TransactionState::Failed {
                kind: FailureKind::Reverted,
                ..
            }
        ));
        assert_eq!(controller.draft(), "gm");
        assert_eq!(contract.reads.get(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_clears_draft_and_reloads() {
        let controller = TransactionController::default();
        let seen = record(&controller);
        let contract = FakeContract::succeeding();
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let receipt = controller
            .submit(&wallet, &contract, &feed, "gm")
            .await
            .unwrap();
        assert_eq!(receipt.block_number, Some(7));
        assert_eq!(controller.draft(), "");
        assert_eq!(contract.reads.get(), 1);
        assert_eq!(feed.borrow().store().len(), 1);
        assert_eq!(feed.borrow().store().records()[0].text, "gm");

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                TransactionState::Submitting,
                TransactionState::AwaitingConfirmation { tx_hash: hash() },
                TransactionState::Confirmed {
                    tx_hash: hash(),
                    block_number: Some(7)
                },
                TransactionState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight() {
        let controller = TransactionController::default();
        let contract = FakeContract::succeeding();
        let (release, gate) = tokio::sync::oneshot::channel();
        *contract.gate.borrow_mut() = Some(gate);
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let first = controller.submit(&wallet, &contract, &feed, "first");
        futures_util::pin_mut!(first);
        assert!(futures_util::poll!(first.as_mut()).is_pending());
        assert!(controller.is_mining());

        let second = controller.submit(&wallet, &contract, &feed, "second").await;
        assert!(matches!(second, Err(TransactionError::AlreadyInFlight)));
        assert_eq!(controller.draft(), "first");
        assert_eq!(contract.submits.get(), 1);

        release.send(()).unwrap();
        first.await.unwrap();
        assert!(!controller.is_mining());
    }

    #[tokio::test]
    async fn test_second_submit_during_reload_after_confirmation() {
        let controller = TransactionController::default();
        let contract = FakeContract::succeeding();
        let (release, gate) = tokio::sync::oneshot::channel();
        *contract.read_gate.borrow_mut() = Some(gate);
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        let first = controller.submit(&wallet, &contract, &feed, "first");
        futures_util::pin_mut!(first);
        assert!(futures_util::poll!(first.as_mut()).is_pending());
        assert!(matches!(
            controller.state(),
            TransactionState::Confirmed { .. }
        ));
        assert!(!controller.is_mining());
        assert!(controller.is_busy());

        let second = controller.submit(&wallet, &contract, &feed, "second").await;
        assert!(matches!(second, Err(TransactionError::AlreadyInFlight)));
        assert_eq!(contract.submits.get(), 1);

        release.send(()).unwrap();
        first.await.unwrap();
        assert!(controller.state().is_idle());
        assert!(!controller.is_busy());

        // the slot is free again once the first submission is done
        *contract.submit.borrow_mut() = Some(Err(ContractError::UserRejected));
        let third = controller.submit(&wallet, &contract, &feed, "third").await;
        assert!(matches!(third, Err(TransactionError::UserRejected)));
        assert_eq!(contract.submits.get(), 2);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_submission_frees_the_slot() {
        let controller = TransactionController::default();
        let contract = FakeContract::succeeding();
        let (_release, gate) = tokio::sync::oneshot::channel::<()>();
        *contract.gate.borrow_mut() = Some(gate);
        let feed = RefCell::new(ReconciliationEngine::new());
        let wallet = connected().await;

        {
            let first = controller.submit(&wallet, &contract, &feed, "first");
            futures_util::pin_mut!(first);
            assert!(futures_util::poll!(first.as_mut()).is_pending());
            assert!(controller.is_busy());
        }
        assert!(!controller.is_busy());
    }
}
