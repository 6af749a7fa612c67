//! Browser wallet injected at `window.ethereum`.
//!
//! Only available with the `wasm-wallet` feature.

use js_sys::{Function, Object, Promise, Reflect, JSON};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use super::WalletCapability;
use crate::error::RpcError;

/// The EIP-1193 provider the browser extension injected.
#[derive(Clone)]
pub struct InjectedWallet {
    ethereum: JsValue,
}

impl InjectedWallet {
    /// Look up `window.ethereum`. `None` if no wallet is installed.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            tracing::info!("Make sure you have a wallet extension installed");
            return None;
        }
        Some(Self { ethereum })
    }
}

impl WalletCapability for InjectedWallet {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let args = Object::new();
        Reflect::set(&args, &"method".into(), &JsValue::from_str(method))
            .map_err(|e| RpcError::Transport(extract_js_error(&e)))?;
        let params_json = serde_json::to_string(&params)
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        let js_params =
            JSON::parse(&params_json).map_err(|e| RpcError::Transport(extract_js_error(&e)))?;
        Reflect::set(&args, &"params".into(), &js_params)
            .map_err(|e| RpcError::Transport(extract_js_error(&e)))?;

        let request: Function = Reflect::get(&self.ethereum, &"request".into())
            .map_err(|e| RpcError::Transport(extract_js_error(&e)))?
            .dyn_into()
            .map_err(|_| RpcError::Transport("ethereum.request is not a function".into()))?;

        let promise: Promise = request
            .call1(&self.ethereum, &args)
            .map_err(provider_error)?
            .dyn_into()
            .map_err(|_| RpcError::Transport("ethereum.request did not return a promise".into()))?;

        let result = JsFuture::from(promise).await.map_err(provider_error)?;
        if result.is_undefined() || result.is_null() {
            return Ok(serde_json::Value::Null);
        }

        let text: String = JSON::stringify(&result)
            .map_err(|e| RpcError::Transport(extract_js_error(&e)))?
            .into();
        serde_json::from_str(&text).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

/// Convert a rejected provider promise into an [`RpcError`].
///
/// EIP-1193 errors carry a numeric `code` and a `message`.
fn provider_error(err: JsValue) -> RpcError {
    let code = Reflect::get(&err, &"code".into())
        .ok()
        .and_then(|c| c.as_f64());
    match code {
        Some(code) => RpcError::JsonRpc {
            code: code as i64,
            message: Reflect::get(&err, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
                .unwrap_or_default(),
            data: None,
        },
        None => RpcError::Transport(extract_js_error(&err)),
    }
}

fn extract_js_error(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            Reflect::get(err, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}
