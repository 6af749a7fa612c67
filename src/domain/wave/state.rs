//! Wave store: rendered by the app, mutated by the engine.

use super::{Provenance, Wave, WaveKey};
use crate::shared::Account;
use std::collections::HashSet;

/// Ordered, de-duplicated list of waves.
///
/// Records are kept in the order they were added. Readers get shared access;
/// only the [`ReconciliationEngine`](super::ReconciliationEngine) mutates it.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    records: Vec<Wave>,
    keys: HashSet<WaveKey>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a bulk snapshot.
    ///
    /// Duplicates inside the snapshot collapse to their first occurrence.
    /// Returns how many records were kept.
    pub(crate) fn replace(&mut self, waves: impl IntoIterator<Item = Wave>) -> usize {
        self.records.clear();
        self.keys.clear();
        for mut wave in waves {
            wave.provenance = Provenance::Bulk;
            self.insert(wave);
        }
        self.records.len()
    }

    /// Append `wave` unless a record with the same identity is present.
    pub(crate) fn insert(&mut self, wave: Wave) -> bool {
        if !self.keys.insert(wave.key()) {
            return false;
        }
        self.records.push(wave);
        true
    }

    pub fn contains(&self, wave: &Wave) -> bool {
        self.keys.contains(&wave.key())
    }

    pub fn records(&self) -> &[Wave] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Wave> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&Wave> {
        self.records.last()
    }

    /// Waves sent by `account`.
    pub fn from_account<'a>(&'a self, account: &'a Account) -> impl Iterator<Item = &'a Wave> + 'a {
        self.records.iter().filter(move |w| w.is_from(account))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
    }
}

impl<'a> IntoIterator for &'a MessageStore {
    type Item = &'a Wave;
    type IntoIter = std::slice::Iter<'a, Wave>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
