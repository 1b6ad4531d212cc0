//! Live feeds over a peer's history
//!
//! A feed yields the peer's current history, then a fresh snapshot every
//! time the history writer reports a change for that peer. Snapshots are
//! read from the store, never under the peer's lock.
//!
//! Feeds subscribe to the [`ChangeBus`] before their first read, so a write
//! that lands between the first read and the first wait is never missed. A
//! consumer that falls behind the bus skips straight to the latest state.

use super::message::PeerHistory;
use super::writer::load_history;
use crate::store::{HistoryStore, StoreError};
use crate::ChatterboxError;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

/// Errors yielded by a feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed's token was cancelled; nothing follows this item
    #[error("aborted")]
    Aborted,

    /// A snapshot could not be read; the feed keeps running
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl From<FeedError> for ChatterboxError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Aborted => ChatterboxError::Aborted,
            FeedError::Persistence(e) => ChatterboxError::Persistence(e),
        }
    }
}

/// Stream of history snapshots for one peer
pub type Feed = BoxStream<'static, Result<PeerHistory, FeedError>>;

/// Change notifications, one peer ID per completed write
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<String>,
}

impl ChangeBus {
    /// Create a bus buffering up to `capacity` notifications per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Announce that `peer_id`'s history changed
    ///
    /// Returns the number of receivers notified.
    pub fn notify(&self, peer_id: &str) -> usize {
        // No receivers is not an error; nobody is watching
        self.sender.send(peer_id.to_string()).unwrap_or(0)
    }

    /// Start receiving notifications sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    Watching,
    Done,
}

struct FeedState {
    store: Arc<dyn HistoryStore>,
    path: String,
    peer_id: String,
    changes: broadcast::Receiver<String>,
    token: CancellationToken,
    phase: Phase,
}

impl FeedState {
    fn abort(mut self) -> Option<(Result<PeerHistory, FeedError>, Self)> {
        self.phase = Phase::Done;
        tracing::debug!(peer_id = %self.peer_id, "Feed aborted");
        Some((Err(FeedError::Aborted), self))
    }

    async fn snapshot(self) -> Option<(Result<PeerHistory, FeedError>, Self)> {
        let result = load_history(self.store.as_ref(), &self.path).await;
        if self.token.is_cancelled() {
            return self.abort();
        }
        if let Err(ref e) = result {
            tracing::warn!(peer_id = %self.peer_id, error = %e, "Failed to read feed snapshot");
        }
        Some((result.map_err(FeedError::from), self))
    }

    /// Wait until this peer changes; `false` once cancelled
    async fn wait_for_change(&mut self) -> bool {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.token.cancelled() => return false,
                received = self.changes.recv() => received,
            };

            match received {
                Ok(peer_id) if peer_id == self.peer_id => return true,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(peer_id = %self.peer_id, skipped, "Feed lagged, re-reading");
                    return true;
                }
                Err(RecvError::Closed) => {
                    // No more writes can happen; only cancellation remains
                    self.token.cancelled().await;
                    return false;
                }
            }
        }
    }
}

/// Open a feed over the history stored at `path` for `peer_id`
///
/// The stream is infinite until `token` is cancelled, at which point it
/// yields one [`FeedError::Aborted`] and ends.
pub fn watch(
    store: Arc<dyn HistoryStore>,
    path: String,
    peer_id: String,
    bus: &ChangeBus,
    token: CancellationToken,
) -> Feed {
    let state = FeedState {
        store,
        path,
        peer_id,
        changes: bus.subscribe(),
        token,
        phase: Phase::Initial,
    };

    stream::unfold(state, |mut state| async move {
        let phase = state.phase;
        match phase {
            Phase::Done => None,
            _ if state.token.is_cancelled() => state.abort(),
            Phase::Initial => {
                state.phase = Phase::Watching;
                state.snapshot().await
            }
            Phase::Watching => {
                if state.wait_for_change().await {
                    state.snapshot().await
                } else {
                    state.abort()
                }
            }
        }
    })
    .boxed()
}
