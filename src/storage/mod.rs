//! Storage Module
//!
//! The per-shard storage engine and the pieces around it: entries, the
//! write-order list, key routing and the background cleaner.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Router                               │
//! │                 hash(key) % shard_count                     │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ one random shard per tick
//!              ┌─────────────┴─────────────┐
//!              │         Cleaner           │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **RwLock**: multiple concurrent readers, exclusive writers
//! - **Write-Order Eviction**: a full shard drops its oldest write
//! - **Lazy Expiry**: expired keys are removed on access
//! - **Active Expiry**: the cleaner sweeps expired keys nobody reads
//!
//! Entries and the write-order list stay private to the crate:
//!
//! ```compile_fail
//! use shardcache::storage::list::WriteOrderList;
//! ```
//!
//! ```compile_fail
//! use shardcache::storage::entry::Entry;
//! ```

pub(crate) mod entry;
pub mod expiry;
pub(crate) mod list;
pub mod router;
pub mod shard;


// Re-export commonly used types
pub use expiry::Cleaner;
pub use router::Router;
pub use shard::Shard;
