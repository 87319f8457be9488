//! Eviction Notifications
//!
//! Whenever an entry leaves the cache (capacity eviction, explicit removal,
//! lazy expiry on read, or a sweep), the configured eviction callback is told
//! about it. The callback never runs on the caller's thread and never runs
//! while a shard lock is held.
//!
//! ## Design
//!
//! ```text
//!   shard ops ──try_send/send──> [ bounded flume queue ] ──recv──> worker 0 ─┐
//!                                                         ──recv──> worker 1 ─┼─> callback(key, value)
//!                                                         ──recv──> worker N ─┘
//! ```
//!
//! Workers are plain OS threads so that a caller blocked on a full queue can
//! never starve them, whichever runtime (if any) the caller is running on.
//!
//! When the queue is full the [`OverflowPolicy`] decides what happens:
//! the caller either waits for a free slot or the oldest queued notification
//! is discarded.

use crate::error::Result;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// User callback invoked with every key/value pair that leaves the cache.
///
/// It must not call back into the cache that produced the notification.
pub type EvictionCallback<K, V> = Arc<dyn Fn(K, V) + Send + Sync + 'static>;

/// What to do when the notification queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// The evicting caller waits until a worker frees a slot.
    #[default]
    Block,
    /// The oldest queued notification is discarded to make room.
    DropOldest,
}

/// Configuration for the notification worker pool.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Number of worker threads running the callback (default: 1)
    pub workers: usize,

    /// Maximum number of queued notifications (default: 1024)
    pub queue_capacity: usize,

    /// Backpressure policy when the queue is full (default: Block)
    pub overflow: OverflowPolicy,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1024,
            overflow: OverflowPolicy::Block,
        }
    }
}

struct Queue<K, V> {
    tx: flume::Sender<(K, V)>,
    // Kept so DropOldest can discard from the front of the queue.
    rx: flume::Receiver<(K, V)>,
    overflow: OverflowPolicy,
}

/// Dispatches eviction notifications to a fixed pool of workers.
pub struct Notifier<K, V> {
    queue: Option<Queue<K, V>>,
    dropped: AtomicU64,
}

impl<K, V> fmt::Debug for Notifier<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.is_enabled())
            .field("queued", &self.queue.as_ref().map(|q| q.tx.len()))
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl<K, V> Notifier<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// A notifier that silently discards everything.
    pub fn disabled() -> Self {
        Self {
            queue: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Starts `config.workers` threads running `callback`.
    ///
    /// The configuration is expected to be validated already.
    pub fn spawn(callback: EvictionCallback<K, V>, config: &NotifyConfig) -> Result<Self> {
        let (tx, rx) = flume::bounded(config.queue_capacity);

        for i in 0..config.workers {
            let rx = rx.clone();
            let callback = Arc::clone(&callback);
            std::thread::Builder::new()
                .name(format!("shardcache-notify-{}", i))
                .spawn(move || worker_loop(rx, callback))?;
        }

        debug!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            overflow = ?config.overflow,
            "Eviction notify workers started"
        );

        Ok(Self {
            queue: Some(Queue {
                tx,
                rx,
                overflow: config.overflow,
            }),
            dropped: AtomicU64::new(0),
        })
    }

    /// Queues one notification.
    ///
    /// Must be called without any shard lock held.
    pub fn notify(&self, key: K, value: V) {
        let Some(queue) = &self.queue else {
            return;
        };

        match queue.overflow {
            OverflowPolicy::Block => {
                // Only fails once every receiver is gone, and we hold one.
                let _ = queue.tx.send((key, value));
            }
            OverflowPolicy::DropOldest => {
                let mut pending = (key, value);
                loop {
                    match queue.tx.try_send(pending) {
                        Ok(()) => return,
                        Err(flume::TrySendError::Full(back)) => {
                            pending = back;
                            if queue.rx.try_recv().is_ok() {
                                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                                if warn_due(dropped) {
                                    warn!(dropped, "Eviction notify queue full, dropped oldest");
                                } else {
                                    trace!(dropped, "Dropped oldest notification");
                                }
                            }
                        }
                        Err(flume::TrySendError::Disconnected(_)) => return,
                    }
                }
            }
        }
    }
}

impl<K, V> Notifier<K, V> {
    /// Returns true if a callback is configured.
    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of notifications discarded by [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sustained overflow warns at 1, 2, 4, 8... drops; the rest is in
/// [`Notifier::dropped`].
#[inline]
fn warn_due(dropped: u64) -> bool {
    dropped.is_power_of_two()
}

/// Runs the callback for every queued pair until all senders are gone.
fn worker_loop<K, V>(rx: flume::Receiver<(K, V)>, callback: EvictionCallback<K, V>) {
    while let Ok((key, value)) = rx.recv() {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(key, value))).is_err() {
            error!("Eviction callback panicked");
        }
    }
    trace!("Eviction notify worker exiting");
}
