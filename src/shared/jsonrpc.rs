//! JSON-RPC 2.0 envelopes shared by the HTTP and WebSocket transports.

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// Outbound request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Error object inside a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<JsonRpcErrorObject> for RpcError {
    fn from(e: JsonRpcErrorObject) -> Self {
        RpcError::JsonRpc {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// Inbound response to a request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// Collapse into the result value, or the error the node returned.
    ///
    /// A missing `result` with no `error` is a valid `null` result
    /// (e.g. a receipt that does not exist yet).
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}
