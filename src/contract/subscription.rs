//! Live wave subscription handle.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;

use crate::domain::wave::wire::LogEntry;
use crate::domain::wave::Wave;

/// An item delivered by a [`WaveSubscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A `NewWave` event, in emission order.
    Wave(Wave),
    /// Entries may have been missed or rolled back (reconnect, reorg).
    /// Consumers should run a bulk read.
    Lagged,
}

impl LiveEvent {
    /// Interpret a `NewWave` log. Undecodable logs are logged and skipped.
    pub fn from_log(log: &LogEntry) -> Option<Self> {
        if log.removed {
            tracing::info!(block = ?log.block_number, "Wave log removed by reorg");
            return Some(LiveEvent::Lagged);
        }
        match Wave::try_from(log) {
            Ok(wave) => Some(LiveEvent::Wave(wave)),
            Err(e) => {
                tracing::warn!(tx = ?log.transaction_hash, "Skipping undecodable wave log: {}", e);
                None
            }
        }
    }
}

/// Disposable stream of [`LiveEvent`]s.
///
/// Delivery stops for good after [`dispose`](Self::dispose), which drops
/// the underlying transport. Disposing is idempotent and also happens on drop.
pub struct WaveSubscription {
    inner: Option<Pin<Box<dyn Stream<Item = LiveEvent>>>>,
}

impl WaveSubscription {
    pub fn new(stream: impl Stream<Item = LiveEvent> + 'static) -> Self {
        Self {
            inner: Some(Box::pin(stream)),
        }
    }

    /// A subscription that never delivers anything.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Stop delivery. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("Wave subscription disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for WaveSubscription {
    type Item = LiveEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut() {
            Some(stream) => stream.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for WaveSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for WaveSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveSubscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
