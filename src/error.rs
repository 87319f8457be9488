//! Construction Errors
//!
//! Cache operations never fail: misses are `None`, and removing an entry that
//! a concurrent operation already removed is a silent no-op. The only errors
//! this crate surfaces are raised while building a cache, before any shard
//! exists.

use thiserror::Error;

/// Errors that can occur while constructing a cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Shard count is zero
    #[error("shard count must be at least 1")]
    ZeroShards,

    /// Some shards would get no capacity at all
    #[error("capacity {capacity} is smaller than shard count {shards}")]
    CapacityBelowShards { capacity: usize, shards: usize },

    /// The cleaner would tick continuously
    #[error("clean interval must be greater than zero")]
    ZeroCleanInterval,

    /// An eviction callback was configured with no threads to run it
    #[error("eviction notify worker count must be at least 1")]
    ZeroNotifyWorkers,

    /// An eviction callback was configured with no room to queue work
    #[error("eviction notify queue capacity must be at least 1")]
    ZeroNotifyQueue,

    /// The background cleaner needs a tokio runtime to run on
    #[error("no tokio runtime available to run the cleaner")]
    NoRuntime,

    /// An eviction notify worker thread could not be started
    #[error("failed to spawn eviction notify worker: {0}")]
    SpawnWorker(#[from] std::io::Error),
}

/// Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
