//! Conversions from ABI / wire types to domain types for waves.

use super::wire::LogEntry;
use super::{Provenance, Wave};
use crate::contract::abi;
use crate::error::ContractError;
use crate::shared::Account;
use alloy_primitives::U256;
use alloy_sol_types::SolEvent;
use chrono::{DateTime, TimeZone, Utc};

/// Contract timestamps are whole seconds (`block.timestamp`).
pub(crate) fn timestamp_from_secs(secs: U256) -> Result<DateTime<Utc>, ContractError> {
    let secs = i64::try_from(secs)
        .map_err(|_| ContractError::Decode(format!("Timestamp out of range: {}", secs)))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ContractError::Decode(format!("Invalid timestamp: {}", secs)))
}

impl TryFrom<abi::Wave> for Wave {
    type Error = ContractError;

    fn try_from(w: abi::Wave) -> Result<Self, Self::Error> {
        Ok(Self {
            sender: Account::from_address(w.waver),
            timestamp: timestamp_from_secs(w.timestamp)?,
            text: w.message,
            provenance: Provenance::Bulk,
        })
    }
}

impl TryFrom<abi::NewWave> for Wave {
    type Error = ContractError;

    fn try_from(e: abi::NewWave) -> Result<Self, Self::Error> {
        Ok(Self {
            sender: Account::from_address(e.from),
            timestamp: timestamp_from_secs(e.timestamp)?,
            text: e.message,
            provenance: Provenance::Live,
        })
    }
}

impl TryFrom<&LogEntry> for Wave {
    type Error = ContractError;

    fn try_from(log: &LogEntry) -> Result<Self, Self::Error> {
        let event = abi::NewWave::decode_raw_log(log.topics.iter().copied(), &log.data, true)?;
        Wave::try_from(event)
    }
}
