// ── Snapshot subscriptions ──
//
// Current-value access plus change notification over the poller's
// published snapshots.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Snapshot;

/// A subscription to the poller's latest snapshot.
///
/// Provides both point-in-time access and reactive change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct SnapshotStream {
    current: Arc<Snapshot>,
    receiver: watch::Receiver<Arc<Snapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Snapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<Snapshot> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication. Returns `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding the current snapshot, then each new one.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<Snapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
