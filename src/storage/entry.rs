//! Cache Entries
//!
//! An [`Entry`] is one stored key/value pair plus its absolute expiration
//! instant. Entries never store a relative TTL: the duration handed to
//! `set` is turned into a deadline once, at write time, and from then on
//! the entry is only ever compared against "now".
//!
//! ## TTL Normalization
//!
//! A TTL of [`Duration::ZERO`] means "never expires". It is stored as
//! `expires_at: None`, never as a deadline in the past. A TTL so large that
//! the deadline overflows [`Instant`] is treated the same way.

use std::time::{Duration, Instant};

/// Identity of an entry within its shard.
///
/// Ids are handed out from a per-shard counter and are never reused, so two
/// entries that happen to share a key at different points in time can still
/// be told apart.
pub type EntryId = u64;

/// Converts a caller-supplied TTL into an absolute deadline.
///
/// Returns `None` (no expiry) for a zero TTL or when `now + ttl` cannot be
/// represented.
#[inline]
pub fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        return None;
    }
    now.checked_add(ttl)
}

/// A stored key/value pair with expiration metadata.
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    /// The key this entry is indexed under
    pub key: K,
    /// The stored value
    pub value: V,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
    /// Shard-local identity, stable across in-place updates
    pub id: EntryId,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry whose deadline is computed from `ttl` at `now`.
    pub fn new(key: K, value: V, ttl: Duration, now: Instant, id: EntryId) -> Self {
        Self {
            key,
            value,
            expires_at: deadline(now, ttl),
            id,
        }
    }

    /// Replaces the value and restarts the TTL. The id is kept.
    pub fn refresh(&mut self, value: V, ttl: Duration, now: Instant) {
        self.expires_at = deadline(now, ttl);
        self.value = value;
    }

    /// Checks if this entry is expired as of `now`.
    ///
    /// An entry is expired only once `now` is strictly after its deadline.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}
