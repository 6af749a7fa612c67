//! End-to-end session tests against an in-memory chain.
//!
//! `FakeChain` answers the JSON-RPC methods the SDK uses (accounts, calls,
//! transactions, receipts, logs) and mines every transaction instantly, so
//! the full wallet → contract → reconciliation path runs without a node.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use serde_json::{json, Value};
use tokio::time::timeout;

use waveportal_sdk::contract::abi;
use waveportal_sdk::prelude::*;

const ALICE: &str = "0x00000000000000000000000000000000000000aa";
const BOB: &str = "0x00000000000000000000000000000000000000bb";
const CAROL: &str = "0x00000000000000000000000000000000000000cc";
const STEP: Duration = Duration::from_secs(5);

// ─── Chain double ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ChainState {
    authorized: Vec<String>,
    waves: Vec<abi::Wave>,
    logs: Vec<Value>,
    receipts: Vec<(B256, Value)>,
    block: u64,
    nonce: u64,
    clock: u64,
    reject_next_send: bool,
    revert_next: bool,
    fail_reads: bool,
}

#[derive(Clone, Default)]
struct FakeChain {
    state: Rc<RefCell<ChainState>>,
}

impl FakeChain {
    fn new() -> Self {
        let chain = Self::default();
        chain.state.borrow_mut().clock = 1_000;
        chain
    }

    fn authorize(&self, account: &str) {
        self.state.borrow_mut().authorized.push(account.to_string());
    }

    /// Mine a block containing a `wave` from `from`. Returns the tx hash.
    fn mine_wave(&self, from: Address, message: &str, timestamp: u64, success: bool) -> B256 {
        let mut state = self.state.borrow_mut();
        state.block += 1;
        state.nonce += 1;
        let block = state.block;
        let tx_hash = keccak256(state.nonce.to_be_bytes());

        if success {
            let event = abi::NewWave {
                from,
                timestamp: U256::from(timestamp),
                message: message.to_string(),
            };
            state.waves.push(abi::Wave {
                waver: from,
                message: message.to_string(),
                timestamp: U256::from(timestamp),
            });
            state.logs.push(json!({
                "address": waveportal_sdk::network::WAVE_PORTAL_ADDRESS,
                "topics": [abi::NewWave::SIGNATURE_HASH, from.into_word()],
                "data": Bytes::from(event.encode_data()),
                "blockNumber": format!("0x{:x}", block),
                "transactionHash": tx_hash,
                "logIndex": "0x0",
                "removed": false,
            }));
        }

        state.receipts.push((
            tx_hash,
            json!({
                "transactionHash": tx_hash,
                "blockNumber": format!("0x{:x}", block),
                "gasUsed": "0xc350",
                "status": if success { "0x1" } else { "0x0" },
            }),
        ));
        tx_hash
    }

    /// Someone else waves.
    fn external_wave(&self, from: &str, timestamp: u64, message: &str) {
        let from: Address = from.parse().unwrap();
        self.mine_wave(from, message, timestamp, true);
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => {
                Ok(json!(self.state.borrow().authorized.clone()))
            }
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", self.state.borrow().block))),
            "eth_call" => {
                if self.state.borrow().fail_reads {
                    return Err(RpcError::ServerError {
                        status: 503,
                        body: "unavailable".into(),
                    });
                }
                let data: Bytes = serde_json::from_value(params[0]["data"].clone()).unwrap();
                let state = self.state.borrow();
                let out = if data[..4] == abi::getAllWavesCall::SELECTOR {
                    (state.waves.clone(),).abi_encode_params()
                } else if data[..4] == abi::getTotalWavesCall::SELECTOR {
                    U256::from(state.waves.len()).abi_encode()
                } else {
                    return Err(RpcError::JsonRpc {
                        code: 3,
                        message: "execution reverted".into(),
                        data: None,
                    });
                };
                Ok(json!(Bytes::from(out)))
            }
            "eth_sendTransaction" => {
                if std::mem::take(&mut self.state.borrow_mut().reject_next_send) {
                    return Err(RpcError::JsonRpc {
                        code: 4001,
                        message: "User denied transaction signature.".into(),
                        data: None,
                    });
                }
                let tx = &params[0];
                let from: Address = serde_json::from_value(tx["from"].clone()).unwrap();
                let data: Bytes = serde_json::from_value(tx["data"].clone()).unwrap();
                assert_eq!(tx["gas"], "0x493e0");
                let call = abi::waveCall::abi_decode(&data, true).unwrap();

                let success = !std::mem::take(&mut self.state.borrow_mut().revert_next);
                let timestamp = {
                    let mut state = self.state.borrow_mut();
                    state.clock += 15;
                    state.clock
                };
                let hash = self.mine_wave(from, &call.message, timestamp, success);
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = serde_json::from_value(params[0].clone()).unwrap();
                let state = self.state.borrow();
                Ok(state
                    .receipts
                    .iter()
                    .find(|(h, _)| *h == hash)
                    .map(|(_, r)| r.clone())
                    .unwrap_or(Value::Null))
            }
            "eth_getLogs" => {
                let from = parse_hex(&params[0]["fromBlock"]);
                let to = parse_hex(&params[0]["toBlock"]);
                let state = self.state.borrow();
                let logs: Vec<Value> = state
                    .logs
                    .iter()
                    .filter(|log| {
                        let block = parse_hex(&log["blockNumber"]);
                        block >= from && block <= to
                    })
                    .cloned()
                    .collect();
                Ok(json!(logs))
            }
            other => Err(RpcError::JsonRpc {
                code: -32601,
                message: format!("method {} not found", other),
                data: None,
            }),
        }
    }
}

fn parse_hex(v: &Value) -> u64 {
    u64::from_str_radix(v.as_str().unwrap().trim_start_matches("0x"), 16).unwrap()
}

impl WalletCapability for FakeChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.handle(method, &params)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn portal(chain: &FakeChain) -> WavePortal<FakeChain> {
    WavePortal::builder()
        .poll_interval(Duration::from_millis(2))
        .confirmation_poll_interval(Duration::from_millis(2))
        .build(Some(chain.clone()))
        .unwrap()
}

fn texts(portal: &WavePortal<FakeChain>) -> Vec<String> {
    portal.messages().into_iter().map(|w| w.text).collect()
}

async fn pump(portal: &WavePortal<FakeChain>) -> Pumped {
    timeout(STEP, portal.pump())
        .await
        .expect("timed out waiting for a live event")
        .expect("pump failed")
}

fn record_states(portal: &WavePortal<FakeChain>) -> Rc<RefCell<Vec<TransactionState>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    portal.on_transaction_state(move |s| sink.borrow_mut().push(s.clone()));
    seen
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_snapshot_then_new_live_wave() {
    let chain = FakeChain::new();
    chain.authorize(ALICE);
    chain.external_wave(BOB, 100, "hello");

    let portal = portal(&chain);
    portal.start().await;
    assert_eq!(portal.current_account(), Some(Account::from(ALICE)));
    assert_eq!(texts(&portal), vec!["hello"]);
    assert_eq!(portal.messages()[0].provenance, Provenance::Bulk);

    chain.external_wave(CAROL, 200, "world");
    assert_eq!(pump(&portal).await, Pumped::Wave(LiveOutcome::Inserted));

    let messages = portal.messages();
    assert_eq!(texts(&portal), vec!["hello", "world"]);
    assert_eq!(messages[1].sender, Account::from(CAROL));
    assert_eq!(messages[1].timestamp.timestamp(), 200);
    assert_eq!(messages[1].provenance, Provenance::Live);

    portal.shutdown();
}

#[tokio::test]
async fn test_wave_confirmed_reloads_and_clears_draft() {
    let chain = FakeChain::new();
    let portal = portal(&chain);
    portal.start().await;
    assert!(portal.current_account().is_none());

    chain.authorize(ALICE);
    assert_eq!(portal.connect_wallet().await.unwrap(), Account::from(ALICE));

    let states = record_states(&portal);
    let receipt = portal.wave("gm").await.unwrap();
    assert_eq!(receipt.block_number, Some(1));

    assert_eq!(texts(&portal), vec!["gm"]);
    assert!(portal.messages()[0].is_from(&Account::from(ALICE)));
    assert_eq!(portal.draft(), "");
    assert!(portal.transaction_state().is_idle());
    assert!(matches!(
        states.borrow()[2],
        TransactionState::Confirmed { block_number: Some(1), .. }
    ));

    // the live copy of our own wave is recognised as a duplicate
    assert_eq!(pump(&portal).await, Pumped::Wave(LiveOutcome::Duplicate));
    assert_eq!(portal.messages().len(), 1);
    assert_eq!(portal.total_waves().await.unwrap(), 1);
}

#[tokio::test]
async fn test_waves_mined_before_first_pump_are_delivered() {
    let chain = FakeChain::new();
    let portal = portal(&chain);
    portal.start().await;
    assert!(portal.messages().is_empty());

    chain.external_wave(BOB, 100, "one");
    chain.external_wave(CAROL, 200, "two");
    assert_eq!(pump(&portal).await, Pumped::Wave(LiveOutcome::Inserted));
    assert_eq!(pump(&portal).await, Pumped::Wave(LiveOutcome::Inserted));

    assert_eq!(texts(&portal), vec!["one", "two"]);
}

#[tokio::test]
async fn test_wave_between_subscribe_and_first_pump_after_snapshot() {
    let chain = FakeChain::new();
    chain.external_wave(BOB, 100, "hello");
    let portal = portal(&chain);
    portal.start().await;

    // covered by neither the snapshot nor an earlier poll
    chain.external_wave(CAROL, 200, "world");
    chain.external_wave(BOB, 300, "again");
    pump(&portal).await;
    pump(&portal).await;

    assert_eq!(texts(&portal), vec!["hello", "world", "again"]);
    assert!(portal
        .messages()
        .iter()
        .skip(1)
        .all(|w| w.provenance == Provenance::Live));
}

#[tokio::test]
async fn test_empty_message_never_leaves_idle() {
    let chain = FakeChain::new();
    chain.authorize(ALICE);
    let portal = portal(&chain);
    portal.start().await;
    let states = record_states(&portal);

    let result = portal.wave("  ").await;
    assert!(matches!(
        result,
        Err(TransactionError::Validation(ValidationError::EmptyMessage))
    ));
    assert!(states.borrow().is_empty());
    assert_eq!(chain.state.borrow().nonce, 0);
}

#[tokio::test]
async fn test_rejected_signature_returns_to_idle() {
    let chain = FakeChain::new();
    chain.authorize(ALICE);
    let portal = portal(&chain);
    portal.start().await;
    chain.state.borrow_mut().reject_next_send = true;
    let states = record_states(&portal);

    let result = portal.wave("gm").await;
    assert!(matches!(result, Err(TransactionError::UserRejected)));
    assert!(portal.transaction_state().is_idle());
    assert_eq!(portal.draft(), "gm");
    assert!(matches!(
        states.borrow()[1],
        TransactionState::Failed {
            kind: FailureKind::UserRejected,
            ..
        }
    ));
    assert!(portal.messages().is_empty());
}

#[tokio::test]
async fn test_reverted_transaction_reported() {
    let chain = FakeChain::new();
    chain.authorize(ALICE);
    let portal = portal(&chain);
    portal.start().await;
    chain.state.borrow_mut().revert_next = true;

    let result = portal.wave("too soon").await;
    match result {
        Err(TransactionError::Reverted { tx_hash, .. }) => assert!(tx_hash.is_some()),
        other => panic!("expected Reverted, got {other:?}"),
    }
    assert_eq!(portal.draft(), "too soon");
    assert!(portal.messages().is_empty());
}

#[tokio::test]
async fn test_failed_initial_read_recovers_on_refresh() {
    let chain = FakeChain::new();
    chain.external_wave(BOB, 100, "hello");
    chain.state.borrow_mut().fail_reads = true;

    let portal = portal(&chain);
    portal.start().await;
    assert!(portal.messages().is_empty());

    chain.state.borrow_mut().fail_reads = false;
    let outcome = portal.refresh().await.unwrap();
    assert_eq!(
        outcome,
        SnapshotOutcome::Applied {
            records: 1,
            replayed: 0
        }
    );
    assert_eq!(texts(&portal), vec!["hello"]);
}

#[tokio::test]
async fn test_observers_see_every_change() {
    let chain = FakeChain::new();
    chain.external_wave(BOB, 100, "hello");
    let portal = portal(&chain);

    let sizes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&sizes);
    portal.on_messages_changed(move |store| sink.borrow_mut().push(store.len()));

    portal.start().await;
    chain.external_wave(CAROL, 200, "world");
    pump(&portal).await;

    assert_eq!(*sizes.borrow(), vec![1, 2]);
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_stops_delivery() {
    let chain = FakeChain::new();
    chain.external_wave(BOB, 100, "hello");
    let portal = portal(&chain);
    portal.start().await;

    portal.shutdown();
    portal.shutdown();

    chain.external_wave(CAROL, 200, "world");
    assert_eq!(portal.pump().await.unwrap(), Pumped::Ended);
    assert_eq!(texts(&portal), vec!["hello"]);
}
