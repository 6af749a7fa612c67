//! Wave domain: message records, the ordered store and the reconciliation
//! engine that merges bulk reads with live events.

mod convert;
pub mod reconcile;
pub mod state;
pub mod wire;

use crate::shared::Account;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use reconcile::{LiveOutcome, ReconciliationEngine, SnapshotOutcome, SnapshotTicket};
pub use state::MessageStore;

/// Where a record entered the store from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Part of a `getAllWaves` snapshot.
    Bulk,
    /// Delivered by a `NewWave` event.
    Live,
}

/// One message appended to the portal.
///
/// Identity is `(sender, timestamp, text)`; `provenance` is metadata and takes
/// no part in de-duplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wave {
    pub sender: Account,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub provenance: Provenance,
}

impl Wave {
    pub fn new(
        sender: impl Into<Account>,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
            text: text.into(),
            provenance,
        }
    }

    pub fn key(&self) -> WaveKey {
        WaveKey {
            sender: self.sender.clone(),
            timestamp: self.timestamp,
            text: self.text.clone(),
        }
    }

    /// Same identity triple, regardless of provenance.
    pub fn same_wave(&self, other: &Wave) -> bool {
        self.sender == other.sender && self.timestamp == other.timestamp && self.text == other.text
    }

    /// Whether this wave was sent by `account`.
    pub fn is_from(&self, account: &Account) -> bool {
        &self.sender == account
    }
}

/// Identity of a wave.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaveKey {
    pub sender: Account,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}
