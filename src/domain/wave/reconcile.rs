//! Reconciliation of bulk snapshots and live events into one [`MessageStore`].
//!
//! Two sources race: `getAllWaves` snapshots (authoritative, but stale by the
//! time they land) and `NewWave` events (fresh, possibly already covered by a
//! snapshot). The engine keeps every live wave received after the start of the
//! most recent applied read, so a snapshot can be laid down wholesale and the
//! newer live waves replayed on top of it. All merges go through identity
//! de-duplication, which makes every operation idempotent and tolerant of
//! arrival order.

use std::cell::RefCell;
use std::collections::HashMap;

use super::{MessageStore, Provenance, Wave, WaveKey};
use crate::contract::WaveContract;
use crate::error::ContractError;
use crate::shared::{ObserverId, Observers};

/// Marks the moment a bulk read was started.
///
/// Take one with [`ReconciliationEngine::begin_snapshot`] *before* issuing
/// the read and hand it back with the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTicket {
    id: u64,
    live_seq: u64,
}

/// Result of [`ReconciliationEngine::apply_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied {
        /// Records kept from the snapshot after de-duplication.
        records: usize,
        /// Live waves re-inserted on top of the snapshot.
        replayed: usize,
    },
    /// A newer snapshot was already applied; this one was dropped.
    Stale,
}

/// Result of [`ReconciliationEngine::apply_live`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Inserted,
    Duplicate,
}

/// Owns the [`MessageStore`] and is its only writer.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    store: MessageStore,
    /// Number of live waves received so far.
    live_seq: u64,
    /// Live waves not yet covered by an applied snapshot, tagged with their
    /// arrival sequence number.
    live_log: Vec<(u64, Wave)>,
    /// Position of each wave in `live_log`.
    live_index: HashMap<WaveKey, usize>,
    next_ticket: u64,
    applied: Option<SnapshotTicket>,
    observers: Observers<MessageStore>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Register a callback run after every change to the store.
    ///
    /// The callback receives the store directly; it must not try to borrow
    /// the engine again.
    pub fn on_change(&mut self, callback: impl FnMut(&MessageStore) + 'static) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Start a bulk read.
    pub fn begin_snapshot(&mut self) -> SnapshotTicket {
        let ticket = SnapshotTicket {
            id: self.next_ticket,
            live_seq: self.live_seq,
        };
        self.next_ticket += 1;
        ticket
    }

    /// Lay down a bulk snapshot and replay live waves newer than its ticket.
    pub fn apply_snapshot(&mut self, ticket: SnapshotTicket, waves: Vec<Wave>) -> SnapshotOutcome {
        if let Some(applied) = self.applied {
            if ticket.id < applied.id {
                tracing::debug!(
                    ticket = ticket.id,
                    applied = applied.id,
                    "Dropping stale snapshot"
                );
                return SnapshotOutcome::Stale;
            }
        }

        let records = self.store.replace(waves);

        self.live_log.retain(|(seq, _)| *seq > ticket.live_seq);
        self.reindex_live_log();

        let mut replayed = 0;
        for (_, wave) in &self.live_log {
            if self.store.insert(wave.clone()) {
                replayed += 1;
            }
        }

        self.applied = Some(ticket);
        tracing::debug!(records, replayed, "Applied wave snapshot");
        self.observers.notify(&self.store);

        SnapshotOutcome::Applied { records, replayed }
    }

    /// Merge one live wave.
    pub fn apply_live(&mut self, mut wave: Wave) -> LiveOutcome {
        wave.provenance = Provenance::Live;
        self.live_seq += 1;

        let key = wave.key();
        match self.live_index.get(&key) {
            // re-delivery: keep one entry, stamped with the latest arrival
            Some(&position) => self.live_log[position].0 = self.live_seq,
            None => {
                self.live_index.insert(key, self.live_log.len());
                self.live_log.push((self.live_seq, wave.clone()));
            }
        }

        if self.store.insert(wave) {
            self.observers.notify(&self.store);
            LiveOutcome::Inserted
        } else {
            tracing::debug!("Discarding duplicate live wave");
            LiveOutcome::Duplicate
        }
    }

    /// Forget everything (new session).
    pub fn reset(&mut self) {
        self.store.clear();
        self.live_log.clear();
        self.live_index.clear();
        self.applied = None;
        self.observers.notify(&self.store);
    }

    /// Live waves still held for replay.
    pub fn pending_replay(&self) -> usize {
        self.live_log.len()
    }

    fn reindex_live_log(&mut self) {
        self.live_index = self
            .live_log
            .iter()
            .enumerate()
            .map(|(position, (_, wave))| (wave.key(), position))
            .collect();
    }
}

/// Run a full `getAllWaves` read through `engine`.
///
/// The ticket is taken before the read so that live waves arriving while it
/// is in flight survive the snapshot. No borrow is held across the await.
pub async fn refresh<C: WaveContract>(
    engine: &RefCell<ReconciliationEngine>,
    contract: &C,
) -> Result<SnapshotOutcome, ContractError> {
    let ticket = engine.borrow_mut().begin_snapshot();
    let waves = contract.read_all().await?;
    Ok(engine.borrow_mut().apply_snapshot(ticket, waves))
}
