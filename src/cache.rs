//! Sharded Cache
//!
//! [`Cache`] is the public face of the crate. It owns a [`Router`], a fixed
//! set of [`Shard`]s, the background [`Cleaner`] and the eviction
//! [`Notifier`], and forwards every key operation to the one shard that owns
//! the key.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Cache                              │
//! │                  route(key) % shards                        │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ index + │ │ index + │ │ index + │ │ index + │           │
//! │  │ order   │ │ order   │ │ order   │ │ order   │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲ one random shard per tick         │ evicted (k, v)
//!   ┌────┴──────┐                     ┌──────▼──────┐
//!   │  Cleaner  │                     │  Notifier   │
//!   └───────────┘                     └─────────────┘
//! ```
//!
//! Operations on different shards never block each other.
//!
//! ## Closing
//!
//! [`Cache::close`] stops the cleaner and empties every shard. Using the cache
//! after `close` is a caller error: nothing panics, but results are
//! unspecified (the shards behave like fresh ones, and nothing sweeps them
//! any more).

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::metrics::{AtomicMetrics, CacheMetrics, CacheStats};
use crate::notify::Notifier;
use crate::storage::{Cleaner, Router, Shard};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A sharded, size-bounded, expiring key-value cache.
///
/// # Thread Safety
///
/// `Cache` is `Send + Sync`; share it behind an `Arc`.
///
/// # Example
///
/// ```
/// use shardcache::{Cache, CacheConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shardcache::Result<()> {
/// let cache: Cache<String, String> =
///     Cache::new(CacheConfig::default().with_capacity(1_000).with_shards(8))?;
///
/// cache.set("name".to_string(), "Ariz".to_string(), Duration::ZERO);
/// assert_eq!(cache.get("name"), Some("Ariz".to_string()));
///
/// // Expires after a minute
/// cache.set("session".to_string(), "abc123".to_string(), Duration::from_secs(60));
///
/// assert_eq!(cache.remove("name"), Some("Ariz".to_string()));
/// assert_eq!(cache.size(), 1);
///
/// cache.close();
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V> {
    name: String,
    router: Router,
    shards: Arc<[Shard<K, V>]>,
    cleaner: Cleaner,
    notifier: Arc<Notifier<K, V>>,
    metrics: Arc<dyn CacheMetrics>,
    closed: AtomicBool,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("shards", &self.shards.len())
            .field("notifier", &self.notifier)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache that counts lookups in an [`AtomicMetrics`] labelled
    /// with the cache name.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CacheConfig<K, V>) -> Result<Self> {
        let metrics = Arc::new(AtomicMetrics::new(config.name.clone()));
        Self::with_metrics(config, metrics)
    }

    /// Creates a cache reporting lookups to the given metrics sink.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_metrics(config: CacheConfig<K, V>, metrics: Arc<dyn CacheMetrics>) -> Result<Self> {
        config.validate()?;
        let shard_count = NonZeroUsize::new(config.shards).ok_or(CacheError::ZeroShards)?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CacheError::NoRuntime);
        }

        let notifier = Arc::new(match config.on_evict.clone() {
            Some(callback) => Notifier::spawn(callback, &config.notify)?,
            None => Notifier::disabled(),
        });

        let shards: Arc<[Shard<K, V>]> = config
            .shard_capacities()
            .into_iter()
            .map(|capacity| Shard::new(capacity, Arc::clone(&notifier)))
            .collect::<Vec<_>>()
            .into();

        let cleaner = Cleaner::start(
            Arc::clone(&shards),
            config.clean_interval,
            config.name.clone(),
        );

        info!(
            cache = %config.name,
            capacity = config.capacity,
            shards = config.shards,
            "Cache initialized"
        );

        Ok(Self {
            name: config.name,
            router: Router::new(shard_count),
            shards,
            cleaner,
            notifier,
            metrics,
            closed: AtomicBool::new(false),
        })
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        &self.shards[self.router.route(key)]
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. Reading does
    /// not change the key's position in the eviction order.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.shard(key).get(key);
        self.metrics.record_lookup(value.is_some());
        value
    }

    /// Sets a key-value pair.
    ///
    /// A `ttl` of [`Duration::ZERO`] means the entry never expires.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.shard(&key).set(key, value, ttl);
    }

    /// Removes a key, returning its previous value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).remove(key)
    }

    /// Number of entries across all shards.
    ///
    /// This is approximate: it may include expired entries not yet
    /// reclaimed, and shards are counted one after another rather than at a
    /// single instant.
    pub fn size(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Returns true if no shard holds an entry.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    /// Stops the background cleaner and releases every shard.
    ///
    /// Calling `close` more than once is harmless. No operation may be
    /// issued after `close`; see the module docs.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cleaner.stop();
        for shard in self.shards.iter() {
            shard.close();
        }
        info!(cache = %self.name, "Cache closed");
    }

    /// Returns lookup counters and the current size.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            lookups: self.metrics.lookups(),
            hits: self.metrics.hits(),
            size: self.size(),
        }
    }

    /// The instance label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Notifications discarded because the notify queue was full.
    pub fn dropped_notifications(&self) -> u64 {
        self.notifier.dropped()
    }
}
