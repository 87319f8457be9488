//! Background Expiry Cleaner
//!
//! This module implements a background task that periodically scans a shard
//! for expired keys and removes them. This is "active expiry", the
//! complement to the "lazy expiry" `get` performs on access.
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry is cheap but only reclaims keys somebody reads again. An
//! expired key that is never read would otherwise sit in its shard until
//! capacity pressure happens to push it out.
//!
//! ## Design
//!
//! The cleaner runs as a Tokio task and on every tick:
//! 1. Sleeps for the configured interval
//! 2. Picks **one** shard uniformly at random
//! 3. Sweeps that shard for expired entries on the blocking pool, since
//!    handing evicted pairs to the notifier may wait on a full queue
//!
//! Sweeping a single shard per tick bounds the pause any one tick can cause.
//! Each shard is visited on average once every `shards × interval`.
//!
//! Shutdown is cooperative: the signal is only observed between ticks, so a
//! sweep that has started always runs to completion.

use crate::storage::shard::Shard;
use rand::Rng;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// A handle to the running cleaner.
///
/// When this handle is dropped, the cleaner task will be stopped.
#[derive(Debug)]
pub struct Cleaner {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Cleaner {
    /// Starts the cleaner as a background task on the current Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `shards` - The shards to pick from; must not be empty
    /// * `interval` - Time between two sweeps; must not be zero
    /// * `label` - Cache name used in log events
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime. `Cache::new` checks for a
    /// runtime before getting here.
    pub fn start<K, V>(shards: Arc<[Shard<K, V>]>, interval: Duration, label: String) -> Self
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            cache = %label,
            shards = shards.len(),
            interval_ms = interval.as_millis() as u64,
            "Background cleaner started"
        );

        let task = tokio::spawn(cleaner_loop(shards, interval, label, shutdown_rx));

        Self { shutdown_tx, task }
    }

    /// Stops the cleaner.
    ///
    /// Safe to call any number of times. This is called automatically when
    /// the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            debug!("Background cleaner stopping");
        }
    }

    /// Returns true once the cleaner task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Cleaner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main cleaner loop.
async fn cleaner_loop<K, V>(
    shards: Arc<[Shard<K, V>]>,
    interval: Duration,
    label: String,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if shards.is_empty() {
        return;
    }

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!(cache = %label, "Cleaner received shutdown signal");
                    return;
                }
            }
        }

        let idx = rand::rng().random_range(0..shards.len());

        // Sweeping may block on a full notify queue, keep it off the runtime
        let sweep_shards = Arc::clone(&shards);
        let removed = match tokio::task::spawn_blocking(move || sweep_shards[idx].sweep()).await {
            Ok(removed) => removed,
            Err(e) => {
                error!(cache = %label, shard = idx, error = %e, "Sweep task failed");
                continue;
            }
        };

        if removed > 0 {
            debug!(
                cache = %label,
                shard = idx,
                removed,
                keys_remaining = shards[idx].len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!(cache = %label, shard = idx, "No expired keys found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{EvictionCallback, Notifier, NotifyConfig, OverflowPolicy};
    use std::time::Instant;

    fn shards(n: usize, capacity: usize) -> Arc<[Shard<String, i32>]> {
        let notifier = Arc::new(Notifier::disabled());
        (0..n)
            .map(|_| Shard::new(capacity, Arc::clone(&notifier)))
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn test_cleaner_reclaims_unread_expired_keys() {
        let shards = shards(1, 100);

        for i in 0..10 {
            shards[0].set(format!("key{}", i), i, Duration::from_millis(20));
        }
        shards[0].set("persistent".to_string(), -1, Duration::ZERO);
        assert_eq!(shards[0].len(), 11);

        let _cleaner = Cleaner::start(
            Arc::clone(&shards),
            Duration::from_millis(10),
            "test".to_string(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Only the persistent key should remain
        assert_eq!(shards[0].len(), 1);
        assert_eq!(shards[0].get("persistent"), Some(-1));
    }

    #[tokio::test]
    async fn test_cleaner_sweeps_one_shard_per_tick() {
        let shards = shards(2, 100);
        for (idx, shard) in shards.iter().enumerate() {
            for i in 0..5 {
                shard.set(format!("s{}-{}", idx, i), i, Duration::from_millis(1));
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cleaner = Cleaner::start(
            Arc::clone(&shards),
            Duration::from_millis(300),
            "test".to_string(),
        );

        // Exactly one tick has fired by now
        tokio::time::sleep(Duration::from_millis(450)).await;
        cleaner.stop();

        let mut lens: Vec<usize> = shards.iter().map(|s| s.len()).collect();
        lens.sort();
        assert_eq!(lens, vec![0, 5]);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let cleaner = Cleaner::start(
            shards(4, 10),
            Duration::from_millis(10),
            "test".to_string(),
        );

        cleaner.stop();
        cleaner.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cleaner.is_finished());
        // Drop calls stop a third time
        drop(cleaner);
    }

    #[tokio::test]
    async fn test_cleaner_stops_on_drop() {
        let shards = shards(1, 10);

        {
            let _cleaner = Cleaner::start(
                Arc::clone(&shards),
                Duration::from_millis(10),
                "test".to_string(),
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
            // Cleaner is dropped here
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        shards[0].set("key".to_string(), 1, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nobody swept, the entry is still counted until it is read
        assert_eq!(shards[0].len(), 1);
        assert_eq!(shards[0].get("key"), None);
        assert_eq!(shards[0].len(), 0);
    }

    #[tokio::test]
    async fn test_slow_callback_does_not_stall_runtime() {
        let callback: EvictionCallback<String, i32> =
            Arc::new(|_, _| std::thread::sleep(Duration::from_millis(10)));
        let config = NotifyConfig {
            workers: 1,
            queue_capacity: 1,
            overflow: OverflowPolicy::Block,
        };
        let notifier = Arc::new(Notifier::spawn(callback, &config).unwrap());
        let shards: Arc<[Shard<String, i32>]> = vec![Shard::new(100, notifier)].into();

        for i in 0..40 {
            shards[0].set(format!("key{}", i), i, Duration::from_millis(1));
        }
        let cleaner = Cleaner::start(
            Arc::clone(&shards),
            Duration::from_millis(5),
            "test".to_string(),
        );

        // The first sweep needs ~400ms to drain 40 pairs through a one-slot queue
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let elapsed = started.elapsed();
        cleaner.stop();

        assert!(
            elapsed < Duration::from_millis(250),
            "timer fired after {:?}",
            elapsed
        );
    }
}
