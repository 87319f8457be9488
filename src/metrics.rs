//! Lookup Metrics
//!
//! Each cache owns its own metrics sink. The cache reports lookup outcomes
//! to it; exporting those numbers to an external system (Prometheus,
//! OpenTelemetry, logs) is left to whoever implements [`CacheMetrics`].
//!
//! The current size is not pushed to the sink. It is sampled on demand
//! through `Cache::size` or `Cache::stats`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives lookup outcomes from one cache instance.
pub trait CacheMetrics: Send + Sync + 'static {
    /// Called once per `get`, with `hit` set when a value was returned.
    fn record_lookup(&self, hit: bool);

    /// Total lookups recorded so far, if the sink keeps count.
    fn lookups(&self) -> u64 {
        0
    }

    /// Total hits recorded so far, if the sink keeps count.
    fn hits(&self) -> u64 {
        0
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    fn record_lookup(&self, _hit: bool) {}
}

/// In-process counters, labelled with the owning cache's name.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    label: String,
    lookups: AtomicU64,
    hits: AtomicU64,
}

impl AtomicMetrics {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reads both counters.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.lookups.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }
}

impl CacheMetrics for AtomicMetrics {
    fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of one cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Instance label
    pub name: String,
    /// Total `get` calls
    pub lookups: u64,
    /// `get` calls that returned a value
    pub hits: u64,
    /// Entries currently held, including expired ones not yet reclaimed
    pub size: usize,
}

impl CacheStats {
    /// Returns hits / lookups, or 0.0 if nothing has been looked up.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}
