//! # shardcache - A Sharded In-Process Key-Value Cache
//!
//! shardcache is an in-memory cache meant to sit inside a larger service as a
//! lookup accelerator. It bounds memory by entry count, expires entries by
//! time, and splits its key space into independently locked shards so that
//! concurrent callers rarely contend.
//!
//! ## Features
//!
//! - **Sharded**: every shard has its own RwLock; shards never block each other
//! - **Bounded**: a full shard evicts its oldest *write*
//! - **TTL Support**: per-entry time-to-live, `Duration::ZERO` for "never"
//! - **Lazy + Active Expiry**: expired entries are removed on access and by a
//!   background cleaner that sweeps one random shard per tick
//! - **Eviction Callback**: bounded, off-thread notification for every entry
//!   that leaves the cache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Cache                                      │
//! │                                                                         │
//! │  get/set/remove ──> Router ──> ┌──────────────────────────────────────┐ │
//! │                                │  ┌────────┐ ┌────────┐ ┌────────┐    │ │
//! │                                │  │Shard 0 │ │Shard 1 │ │...N    │    │ │
//! │                                │  │RwLock  │ │RwLock  │ │shards  │    │ │
//! │                                │  └────────┘ └────────┘ └────────┘    │ │
//! │                                └───────▲───────────────────┬──────────┘ │
//! │                                        │                   │ (k, v)     │
//! │                     ┌──────────────────┴──────┐   ┌────────▼─────────┐  │
//! │                     │         Cleaner         │   │     Notifier     │  │
//! │                     │  (Background Tokio Task)│   │ (worker threads) │  │
//! │                     └─────────────────────────┘   └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use shardcache::{Cache, CacheConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> shardcache::Result<()> {
//!     let config = CacheConfig::default()
//!         .with_name("users")
//!         .with_capacity(100_000)
//!         .with_shards(32)
//!         .with_eviction_callback(|key: String, _value: u64| {
//!             println!("{} left the cache", key);
//!         });
//!     let cache = Cache::new(config)?;
//!
//!     cache.set("alice".to_string(), 42, Duration::from_secs(300));
//!     assert_eq!(cache.get("alice"), Some(42));
//!
//!     cache.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`cache`]: the public [`Cache`] facade
//! - [`storage`]: shards, routing, entries and the background cleaner
//! - [`notify`]: bounded eviction-callback dispatch
//! - [`metrics`]: the per-instance metrics seam
//! - [`config`]: construction parameters and validation
//!
//! ## Design Highlights
//!
//! ### Write-Order Recency
//!
//! Only writes move an entry to the "newest" end. Reads never reorder, so a
//! hot but never rewritten key will still be evicted once it becomes the
//! oldest write in its shard.
//!
//! ### Lazy + Active Expiry
//!
//! Entries with a TTL are expired in two ways:
//! 1. **Lazy**: when a key is read, we check if it's expired
//! 2. **Active**: a background task sweeps one random shard per tick
//!
//! Expiry is best effort. An expired entry may still be counted by
//! [`Cache::size`] until one of the two paths reaches it.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod storage;

// Re-export commonly used types for convenience
pub use cache::Cache;
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use metrics::{AtomicMetrics, CacheMetrics, CacheStats, NoopMetrics};
pub use notify::{EvictionCallback, NotifyConfig, OverflowPolicy};

/// Version of shardcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
