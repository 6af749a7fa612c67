//! Shared newtypes and utilities used across all modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw format the node and wallet send, so they can be used directly in
//! wire types without conversion overhead.

pub mod jsonrpc;
pub mod observer;
pub mod serde_util;

pub use observer::{ObserverId, Observers};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// ─── Account ─────────────────────────────────────────────────────────────────

/// A wallet address as handed out by the wallet or the contract.
///
/// Kept as the string the wallet returned (checksummed or lowercase), but
/// equality and hashing are ASCII case-insensitive, so `0xAbC…` and `0xabc…`
/// name the same account.
#[derive(Debug, Clone)]
pub struct Account(String);

impl Account {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form, as used for comparisons.
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    pub fn to_address(&self) -> Result<Address, String> {
        Address::from_str(&self.0).map_err(|e| e.to_string())
    }

    pub fn from_address(address: Address) -> Self {
        Self(address.to_checksum(None))
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Account {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self::from_address(address)
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Account(s))
    }
}

// ─── TxHash ──────────────────────────────────────────────────────────────────

/// Hash of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub B256);

impl TxHash {
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for TxHash {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl FromStr for TxHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s).map(TxHash).map_err(|e| e.to_string())
    }
}
