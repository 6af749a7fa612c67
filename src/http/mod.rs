//! JSON-RPC over HTTP: `JsonRpcHttp` with per-method retry policies.

pub mod client;
pub mod retry;

pub use client::JsonRpcHttp;
pub use retry::{RetryConfig, RetryPolicy};
