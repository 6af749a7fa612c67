//! Wallet capability and session.
//!
//! ## Capability
//!
//! [`WalletCapability`] is the EIP-1193 `request({ method, params })` surface.
//! It is obtained once at startup and passed in explicitly:
//!
//! - **Browser** (`wasm-wallet`): [`injected::InjectedWallet`] wraps
//!   `window.ethereum`.
//! - **Native** (`http`): [`JsonRpcHttp`](crate::http::JsonRpcHttp) talks to a
//!   node whose accounts are already unlocked (dev nodes).
//! - **Tests**: any in-memory double.
//!
//! ## Session
//!
//! [`WalletSession`] caches the authorized account. `connect()` prompts at
//! most once; `restore()` is the silent startup check.

#[cfg(feature = "wasm-wallet")]
pub mod injected;

use std::cell::RefCell;

use crate::error::{RpcError, WalletError};
use crate::shared::Account;

/// Silent account query; never prompts.
pub const METHOD_ACCOUNTS: &str = "eth_accounts";

/// Prompting account query.
pub const METHOD_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";

/// EIP-1193 request surface provided by a wallet.
#[allow(async_fn_in_trait)]
pub trait WalletCapability {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError>;
}

/// Connected-account state for one session.
pub struct WalletSession<W> {
    capability: Option<W>,
    account: RefCell<Option<Account>>,
}

impl<W: WalletCapability> WalletSession<W> {
    /// `None` means no wallet is installed.
    pub fn new(capability: Option<W>) -> Self {
        Self {
            capability,
            account: RefCell::new(None),
        }
    }

    pub fn capability(&self) -> Option<&W> {
        self.capability.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.capability.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.account.borrow().is_some()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.account.borrow().clone()
    }

    /// Adopt an already-authorized account without prompting.
    ///
    /// Returns `Ok(None)` when the wallet has not authorized this site yet.
    pub async fn restore(&self) -> Result<Option<Account>, WalletError> {
        if let Some(account) = self.current_account() {
            return Ok(Some(account));
        }
        let capability = self.capability.as_ref().ok_or(WalletError::Unavailable)?;

        let value = capability
            .request(METHOD_ACCOUNTS, serde_json::json!([]))
            .await?;
        let accounts = parse_accounts(value)?;

        match accounts.into_iter().next() {
            Some(account) => {
                tracing::info!("Found an authorized account: {}", account);
                *self.account.borrow_mut() = Some(account.clone());
                Ok(Some(account))
            }
            None => {
                tracing::info!("No authorized account found");
                Ok(None)
            }
        }
    }

    /// Ask the wallet for authorization and cache the primary account.
    ///
    /// Returns the cached account without prompting if already connected.
    pub async fn connect(&self) -> Result<Account, WalletError> {
        if let Some(account) = self.current_account() {
            return Ok(account);
        }
        let capability = self.capability.as_ref().ok_or(WalletError::Unavailable)?;

        let value = capability
            .request(METHOD_REQUEST_ACCOUNTS, serde_json::json!([]))
            .await?;
        let account = parse_accounts(value)?
            .into_iter()
            .next()
            .ok_or(WalletError::NoAccounts)?;

        tracing::info!("Connected {}", account);
        *self.account.borrow_mut() = Some(account.clone());
        Ok(account)
    }

    /// Forget the cached account.
    pub fn disconnect(&self) {
        if let Some(account) = self.account.borrow_mut().take() {
            tracing::info!("Disconnected {}", account);
        }
    }
}

fn parse_accounts(value: serde_json::Value) -> Result<Vec<Account>, WalletError> {
    serde_json::from_value::<Vec<Account>>(value)
        .map_err(|e| WalletError::Rpc(RpcError::Decode(format!("Invalid account list: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Wallet double answering account queries.
    struct FakeWallet {
        authorized: Vec<&'static str>,
        grants: Vec<&'static str>,
        reject: bool,
        prompts: Cell<u32>,
    }

    impl FakeWallet {
        fn new(authorized: Vec<&'static str>, grants: Vec<&'static str>) -> Self {
            Self {
                authorized,
                grants,
                reject: false,
                prompts: Cell::new(0),
            }
        }
    }

    impl WalletCapability for FakeWallet {
        async fn request(
            &self,
            method: &str,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, RpcError> {
            match method {
                METHOD_ACCOUNTS => Ok(serde_json::json!(self.authorized)),
                METHOD_REQUEST_ACCOUNTS => {
                    self.prompts.set(self.prompts.get() + 1);
                    if self.reject {
                        return Err(RpcError::JsonRpc {
                            code: 4001,
                            message: "User rejected the request.".into(),
                            data: None,
                        });
                    }
                    Ok(serde_json::json!(self.grants))
                }
                other => Err(RpcError::Transport(format!("unexpected {}", other))),
            }
        }
    }

    #[tokio::test]
    async fn test_connect_without_capability() {
        let session: WalletSession<FakeWallet> = WalletSession::new(None);
        assert!(!session.is_available());
        assert!(matches!(session.connect().await, Err(WalletError::Unavailable)));
        assert!(matches!(session.restore().await, Err(WalletError::Unavailable)));
        assert!(session.current_account().is_none());
    }

    #[tokio::test]
    async fn test_connect_caches_and_prompts_once() {
        let session = WalletSession::new(Some(FakeWallet::new(vec![], vec!["0xAA", "0xBB"])));
        let first = session.connect().await.unwrap();
        let second = session.connect().await.unwrap();

        assert_eq!(first, Account::from("0xaa"));
        assert_eq!(second, first);
        assert_eq!(session.capability().unwrap().prompts.get(), 1);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut wallet = FakeWallet::new(vec![], vec!["0xAA"]);
        wallet.reject = true;
        let session = WalletSession::new(Some(wallet));

        assert!(matches!(session.connect().await, Err(WalletError::UserRejected)));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_restore_is_silent() {
        let session = WalletSession::new(Some(FakeWallet::new(vec!["0xAA"], vec!["0xCC"])));
        let restored = session.restore().await.unwrap();
        assert_eq!(restored, Some(Account::from("0xAA")));
        assert_eq!(session.capability().unwrap().prompts.get(), 0);

        // connect now reuses the restored account
        assert_eq!(session.connect().await.unwrap(), Account::from("0xAA"));
        assert_eq!(session.capability().unwrap().prompts.get(), 0);
    }

    #[tokio::test]
    async fn test_restore_without_authorization() {
        let session = WalletSession::new(Some(FakeWallet::new(vec![], vec!["0xAA"])));
        assert_eq!(session.restore().await.unwrap(), None);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_empty_grant_is_error() {
        let session = WalletSession::new(Some(FakeWallet::new(vec![], vec![])));
        assert!(matches!(session.connect().await, Err(WalletError::NoAccounts)));
    }

    #[tokio::test]
    async fn test_disconnect_forgets_account() {
        let session = WalletSession::new(Some(FakeWallet::new(vec!["0xAA"], vec![])));
        session.restore().await.unwrap();
        session.disconnect();
        assert!(session.current_account().is_none());
    }
}
