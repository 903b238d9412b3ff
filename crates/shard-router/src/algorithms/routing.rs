//! # Routing Algorithms
//!
//! Pure key-to-shard functions. No I/O.
//!
//! Hash routing is `digest(key) % shard_count`: fast, stable across
//! processes, but nearly every key may move when the shard count changes.

use crate::domain::{RecordId, RoutingStrategy, ShardIndex, Topology};
use sha3::{Digest, Keccak256};

/// Route a key against a topology.
///
/// Total over all keys; the result is always in `[0, shard_count)`.
pub fn route(key: RecordId, topology: &Topology) -> ShardIndex {
    match topology.strategy() {
        RoutingStrategy::Hash => hash_route(key, topology.shard_count()),
        RoutingStrategy::Range(table) => range_route(key, table.upper_bounds()),
    }
}

/// Modulo-of-digest routing.
///
/// The digest input is the key's canonical decimal form, so the mapping does
/// not depend on integer width or endianness.
pub fn hash_route(key: RecordId, shard_count: usize) -> ShardIndex {
    if shard_count == 0 {
        return 0;
    }

    (key_digest(key) % shard_count as u64) as ShardIndex
}

/// First 8 bytes (big-endian) of Keccak-256 over the decimal key.
pub fn key_digest(key: RecordId) -> u64 {
    let mut hasher = Keccak256::new();
    hasher.update(key.to_string().as_bytes());
    let hash = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(prefix)
}

/// Boundary-table routing.
///
/// `key <= upper_bounds[i]` picks the first such `i`; anything above the
/// last bound goes to the catch-all shard `upper_bounds.len()`.
pub fn range_route(key: RecordId, upper_bounds: &[RecordId]) -> ShardIndex {
    // bounds are strictly increasing, so the partition point is the owner
    upper_bounds.partition_point(|&bound| bound < key)
}

/// Check if two keys are owned by different shards.
pub fn is_cross_shard(a: RecordId, b: RecordId, topology: &Topology) -> bool {
    route(a, topology) != route(b, topology)
}
