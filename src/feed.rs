/*!
 * Deliver snapshots of the location store to anything that wants to react to them.
 *
 * A consumer calls [SnapshotFeed::subscribe] when it starts up and keeps the returned
 * [Subscription] for as long as it wants updates. Dropping the subscription unsubscribes. The
 * producer calls [SnapshotFeed::publish] every time it has a new view of the store.
 */
use crate::sample::UserSample;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::debug;
use rustc_hash::FxHashMap as HashMap;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
    time::Duration,
};

/// How many unread snapshots a subscriber can fall behind before it starts missing them.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Everyone else's most recent location, as of a single read of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// When the store was read.
    pub taken: DateTime<Utc>,
    /// The users, in the order the store returned them.
    pub samples: Vec<UserSample>,
}

impl Snapshot {
    pub fn new(taken: DateTime<Utc>, samples: Vec<UserSample>) -> Self {
        Snapshot { taken, samples }
    }
}

struct FeedInner {
    next_id: AtomicU64,
    queue_depth: usize,
    subscribers: Mutex<HashMap<u64, Sender<Arc<Snapshot>>>>,
}

impl FeedInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, Sender<Arc<Snapshot>>>> {
        // A panic while holding the lock can't leave the map half updated.
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The publishing side of the snapshot channel. Cloning gives another handle to the same feed.
#[derive(Clone)]
pub struct SnapshotFeed {
    inner: Arc<FeedInner>,
}

impl Default for SnapshotFeed {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl SnapshotFeed {
    /// Create a feed where each subscriber can have up to `queue_depth` unread snapshots.
    pub fn new(queue_depth: usize) -> Self {
        SnapshotFeed {
            inner: Arc::new(FeedInner {
                next_id: AtomicU64::new(0),
                queue_depth: queue_depth.max(1),
                subscribers: Mutex::new(HashMap::default()),
            }),
        }
    }

    /// Start receiving snapshots.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(self.inner.queue_depth);

        self.inner.subscribers().insert(id, tx);
        debug!("subscriber {} added", id);

        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
            rx,
        }
    }

    /**
     * Send a snapshot to every subscriber.
     *
     * A subscriber that already has a full queue misses this snapshot, a newer one will replace it
     * soon enough. Subscribers that have gone away are forgotten.
     *
     * #Returns
     * The number of subscribers the snapshot was delivered to.
     */
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let mut subscribers = self.inner.subscribers();

        let mut delivered = 0;
        subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&snapshot)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("subscriber {} is behind, skipped a snapshot", id);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("subscriber {} disconnected", id);
                false
            }
        });

        delivered
    }

    /// Drop every subscriber. Their queued snapshots can still be read, after that they end.
    pub fn close(&self) {
        self.inner.subscribers().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// The receiving side of a snapshot feed. Unsubscribes when dropped.
pub struct Subscription {
    id: u64,
    feed: Weak<FeedInner>,
    rx: Receiver<Arc<Snapshot>>,
}

impl Subscription {
    /// Block until the next snapshot, or `None` if the feed has been closed or dropped.
    pub fn recv(&self) -> Option<Arc<Snapshot>> {
        self.rx.recv().ok()
    }

    /// Like `recv`, but give up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Arc<Snapshot>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// The next snapshot if one is already waiting.
    pub fn try_recv(&self) -> Option<Arc<Snapshot>> {
        self.rx.try_recv().ok()
    }

    /// Iterate over snapshots until the feed is closed.
    pub fn iter(&self) -> impl Iterator<Item = Arc<Snapshot>> + '_ {
        self.rx.iter()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.subscribers().remove(&self.id);
            debug!("subscriber {} removed", self.id);
        }
    }
}
