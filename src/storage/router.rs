//! Key-to-Shard Routing
//!
//! Keys are distributed across shards using a hash function. Every cache
//! instance owns one [`Router`] built from a freshly seeded [`RandomState`],
//! so routing is stable for the lifetime of the instance but differs between
//! instances and process restarts.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

/// Maps keys to shard indices.
#[derive(Debug, Clone)]
pub struct Router<S = RandomState> {
    hasher: S,
    shards: NonZeroUsize,
}

impl Router {
    /// Creates a router over `shards` shards with a random hash seed.
    pub fn new(shards: NonZeroUsize) -> Self {
        Self::with_hasher(shards, RandomState::new())
    }
}

impl<S: BuildHasher> Router<S> {
    /// Creates a router with an explicit hasher.
    pub fn with_hasher(shards: NonZeroUsize, hasher: S) -> Self {
        Self { hasher, shards }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub fn route<K: Hash + ?Sized>(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.shards.get() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = Router::new(shards(16));
        for i in 0..1_000 {
            let key = format!("key-{}", i);
            assert_eq!(router.route(&key), router.route(&key));
        }
    }

    #[test]
    fn test_route_stays_in_range() {
        let router = Router::new(shards(7));
        for i in 0..1_000u64 {
            assert!(router.route(&i) < 7);
        }
    }

    #[test]
    fn test_single_shard() {
        let router = Router::new(shards(1));
        assert_eq!(router.route("anything"), 0);
        assert_eq!(router.route(&42), 0);
    }

    #[test]
    fn test_distribution_touches_every_shard() {
        let router = Router::new(shards(8));
        let mut counts = [0usize; 8];
        for i in 0..8_000u64 {
            counts[router.route(&i)] += 1;
        }
        // Loose bound: every shard gets a meaningful share
        assert!(counts.iter().all(|&c| c > 500), "{:?}", counts);
    }

    #[test]
    fn test_borrowed_and_owned_keys_agree() {
        let router = Router::new(shards(32));
        let owned = String::from("session:abc");
        assert_eq!(router.route(&owned), router.route("session:abc"));
    }
}
