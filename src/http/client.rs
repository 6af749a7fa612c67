//! Low-level JSON-RPC client: `JsonRpcHttp`.
//!
//! One `call` entry point; the retry policy is picked per method. Returns
//! raw JSON values (decoding happens in the contract layer).

use crate::error::RpcError;
use crate::http::retry::{RetryConfig, RetryPolicy};
use crate::shared::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::wallet::{WalletCapability, METHOD_ACCOUNTS, METHOD_REQUEST_ACCOUNTS};

use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// JSON-RPC client for an Ethereum node endpoint.
///
/// As a [`WalletCapability`] it stands in for a browser wallet on native
/// targets: transactions are signed by the node's unlocked accounts, and
/// `eth_requestAccounts` is answered with `eth_accounts` since a node has no
/// prompt to show.
#[derive(Clone)]
pub struct JsonRpcHttp {
    url: String,
    client: Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcHttp {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let mut builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder
                .timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(10);
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client: builder.build()?,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC call using the method's default retry policy.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        self.call_with_retry(method, params, RetryPolicy::for_method(method))
            .await
    }

    pub async fn call_with_retry(
        &self,
        method: &str,
        params: serde_json::Value,
        retry: RetryPolicy,
    ) -> Result<serde_json::Value, RpcError> {
        let config = match &retry {
            RetryPolicy::None => {
                return self.do_request(method, &params).await;
            }
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request(method, &params).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = match &e {
                        RpcError::ServerError { status, .. } => {
                            config.retryable_statuses.contains(status)
                        }
                        RpcError::RateLimited { retry_after_ms } => {
                            if let Some(ms) = retry_after_ms {
                                futures_timer::Delay::new(Duration::from_millis(*ms)).await;
                            }
                            true
                        }
                        RpcError::Timeout => true,
                        RpcError::Reqwest(re) => {
                            #[cfg(not(target_arch = "wasm32"))]
                            let retryable = re.is_connect() || re.is_timeout() || re.is_request();
                            #[cfg(target_arch = "wasm32")]
                            let retryable = re.is_timeout() || re.is_request();
                            retryable
                        }
                        _ => false,
                    };

                    if should_retry && attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying {} against {}",
                            method,
                            self.url
                        );
                        futures_timer::Delay::new(delay).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(RpcError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request(
        &self,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest::new(id, method, params);

        let resp = self.client.post(&self.url).json(&body).send().await?;
        let status = resp.status();

        if status.is_success() {
            let parsed = resp.json::<JsonRpcResponse>().await?;
            return parsed.into_result();
        }

        let status_code = status.as_u16();
        let retry_after_ms = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body_text = resp.text().await.unwrap_or_default();

        match status_code {
            408 => Err(RpcError::Timeout),
            429 => Err(RpcError::RateLimited { retry_after_ms }),
            _ => Err(RpcError::ServerError {
                status: status_code,
                body: body_text,
            }),
        }
    }
}

impl WalletCapability for JsonRpcHttp {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let method = if method == METHOD_REQUEST_ACCOUNTS {
            METHOD_ACCOUNTS
        } else {
            method
        };
        self.call(method, params).await
    }
}

impl std::fmt::Debug for JsonRpcHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcHttp").field("url", &self.url).finish()
    }
}
