//! Custom serde helpers for JSON-RPC wire formats.

use crate::error::RpcError;

/// Parse a JSON-RPC quantity (`"0x1b4"`) into a `u64`.
pub fn parse_quantity(s: &str) -> Result<u64, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| RpcError::Decode(format!("Quantity without 0x prefix: {}", s)))?;
    if digits.is_empty() {
        return Err(RpcError::Decode("Empty quantity".into()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("Invalid quantity {}: {}", s, e)))
}

/// Format a `u64` as a JSON-RPC quantity.
pub fn format_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// (De)serializes a `u64` as a hex quantity string.
pub mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_quantity(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_quantity(&s).map_err(serde::de::Error::custom)
    }
}

/// Same as [`quantity`] for optional fields (`null` while pending).
pub mod opt_quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&super::format_quantity(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| super::parse_quantity(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
