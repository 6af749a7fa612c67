//! Subscription parameters and tracking.
//!
//! Node-assigned subscription ids only live as long as the connection, so the
//! tracker keeps the parameters (what to resubscribe after a reconnect) apart
//! from the ids (what the current connection calls them).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::wave::wire::LogFilter;

/// What to subscribe to with `eth_subscribe`.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub enum SubscribeParams {
    /// Logs matching a filter.
    Logs(LogFilter),
    /// New block headers.
    NewHeads,
}

impl SubscribeParams {
    /// The `params` array of the `eth_subscribe` request.
    pub fn to_params(&self) -> Result<serde_json::Value, serde_json::Error> {
        Ok(match self {
            SubscribeParams::Logs(filter) => {
                serde_json::json!(["logs", serde_json::to_value(filter)?])
            }
            SubscribeParams::NewHeads => serde_json::json!(["newHeads"]),
        })
    }

    pub fn subscription_key(&self) -> String {
        match self {
            SubscribeParams::Logs(filter) => format!("logs:{}", filter.address),
            SubscribeParams::NewHeads => "newHeads".to_string(),
        }
    }
}

/// Tracks active subscriptions across reconnects.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    active: Vec<SubscribeParams>,
    /// Request id → params, awaiting the node's answer.
    pending: HashMap<u64, SubscribeParams>,
    /// Node subscription id → params, for the current connection.
    ids: HashMap<String, SubscribeParams>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `params`. Returns `false` if already tracked.
    pub fn track(&mut self, params: &SubscribeParams) -> bool {
        if self.active.contains(params) {
            return false;
        }
        tracing::debug!("Tracking subscription: {}", params.subscription_key());
        self.active.push(params.clone());
        true
    }

    /// Forget `params`, returning the node id to cancel if it has one.
    pub fn untrack(&mut self, params: &SubscribeParams) -> Option<String> {
        self.active.retain(|p| p != params);
        self.pending.retain(|_, p| p != params);
        let id = self
            .ids
            .iter()
            .find(|(_, p)| *p == params)
            .map(|(id, _)| id.clone());
        if let Some(id) = &id {
            self.ids.remove(id);
        }
        id
    }

    /// Note that request `request_id` subscribes to `params`.
    pub fn mark_pending(&mut self, request_id: u64, params: SubscribeParams) {
        self.pending.insert(request_id, params);
    }

    /// Resolve a subscribe response. Returns the params it was for.
    pub fn confirm(&mut self, request_id: u64, subscription: &str) -> Option<SubscribeParams> {
        let params = self.pending.remove(&request_id)?;
        self.ids.insert(subscription.to_string(), params.clone());
        Some(params)
    }

    /// Drop a pending request the node refused.
    pub fn reject(&mut self, request_id: u64) -> Option<SubscribeParams> {
        self.pending.remove(&request_id)
    }

    pub fn params_for(&self, subscription: &str) -> Option<&SubscribeParams> {
        self.ids.get(subscription)
    }

    /// Connection lost: all ids are void, tracked params remain.
    pub fn reset_ids(&mut self) {
        self.pending.clear();
        self.ids.clear();
    }

    pub fn active(&self) -> &[SubscribeParams] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
