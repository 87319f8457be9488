//! Cache Configuration
//!
//! All parameters have defaults; override the ones you care about either
//! with struct update syntax or the chained `with_*` setters:
//!
//! ```
//! use shardcache::CacheConfig;
//! use std::time::Duration;
//!
//! let config: CacheConfig<String, String> = CacheConfig::default()
//!     .with_name("sessions")
//!     .with_capacity(10_000)
//!     .with_shards(16)
//!     .with_clean_interval(Duration::from_millis(250));
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{CacheError, Result};
use crate::notify::{EvictionCallback, NotifyConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default total number of entries across all shards.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 100;

/// Default time between two cleaner ticks.
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`Cache`](crate::Cache).
pub struct CacheConfig<K, V> {
    /// Instance label, used in logs and metrics (default: "default")
    pub name: String,

    /// Total entry capacity, split across shards (default: 1,000,000)
    pub capacity: usize,

    /// Number of independently locked shards (default: 100)
    pub shards: usize,

    /// Interval between background sweeps of one random shard (default: 100ms)
    pub clean_interval: Duration,

    /// Called with every key/value pair that leaves the cache
    pub on_evict: Option<EvictionCallback<K, V>>,

    /// Worker pool and backpressure for `on_evict`
    pub notify: NotifyConfig,
}

impl<K, V> Default for CacheConfig<K, V> {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            capacity: DEFAULT_CAPACITY,
            shards: DEFAULT_SHARDS,
            clean_interval: DEFAULT_CLEAN_INTERVAL,
            on_evict: None,
            notify: NotifyConfig::default(),
        }
    }
}

impl<K, V> Clone for CacheConfig<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            capacity: self.capacity,
            shards: self.shards,
            clean_interval: self.clean_interval,
            on_evict: self.on_evict.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl<K, V> fmt::Debug for CacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("shards", &self.shards)
            .field("clean_interval", &self.clean_interval)
            .field("on_evict", &self.on_evict.is_some())
            .field("notify", &self.notify)
            .finish()
    }
}

impl<K, V> CacheConfig<K, V> {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = interval;
        self
    }

    /// Sets the eviction callback.
    ///
    /// The callback runs on a notify worker thread and must not call back
    /// into the cache.
    pub fn with_eviction_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(K, V) + Send + Sync + 'static,
    {
        let callback: EvictionCallback<K, V> = Arc::new(callback);
        self.on_evict = Some(callback);
        self
    }

    pub fn with_notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    /// Checks every parameter before anything is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(CacheError::ZeroShards);
        }
        if self.capacity < self.shards {
            return Err(CacheError::CapacityBelowShards {
                capacity: self.capacity,
                shards: self.shards,
            });
        }
        if self.clean_interval.is_zero() {
            return Err(CacheError::ZeroCleanInterval);
        }
        if self.on_evict.is_some() {
            if self.notify.workers == 0 {
                return Err(CacheError::ZeroNotifyWorkers);
            }
            if self.notify.queue_capacity == 0 {
                return Err(CacheError::ZeroNotifyQueue);
            }
        }
        Ok(())
    }

    /// Capacity of each shard.
    ///
    /// Every shard gets `capacity / shards`; the first `capacity % shards`
    /// shards get one more so the total matches `capacity` exactly.
    pub fn shard_capacities(&self) -> Vec<usize> {
        if self.shards == 0 {
            return Vec::new();
        }
        let base = self.capacity / self.shards;
        let extra = self.capacity % self.shards;
        (0..self.shards)
            .map(|i| if i < extra { base + 1 } else { base })
            .collect()
    }
}
