//! # Domain Invariants
//!
//! Rules that must hold for routing and shard placement.
//!
//! The routing function is passed in so the checks stay independent of the
//! routing algorithms.

use super::entities::ShardListing;
use super::errors::{RecordId, ShardError, ShardIndex};
use super::topology::Topology;
use std::collections::HashMap;

/// Invariant: routing is deterministic.
///
/// Same key + same topology = same shard index.
pub fn invariant_deterministic_routing<F>(route_fn: F, key: RecordId, topology: &Topology) -> bool
where
    F: Fn(RecordId, &Topology) -> ShardIndex,
{
    let first = route_fn(key, topology);
    let second = route_fn(key, topology);
    first == second
}

/// Invariant: a routed index is inside `[0, shard_count)`.
pub fn invariant_route_in_bounds(index: ShardIndex, topology: &Topology) -> Result<(), ShardError> {
    if index >= topology.shard_count() {
        return Err(ShardError::StateInconsistency(format!(
            "route returned shard {} for a topology of {} shards",
            index,
            topology.shard_count()
        )));
    }
    Ok(())
}

/// Invariant: range routing never assigns a larger key to an earlier shard.
pub fn invariant_range_monotonic<F>(
    route_fn: F,
    lower: RecordId,
    higher: RecordId,
    topology: &Topology,
) -> Result<(), ShardError>
where
    F: Fn(RecordId, &Topology) -> ShardIndex,
{
    let (lower, higher) = if lower <= higher {
        (lower, higher)
    } else {
        (higher, lower)
    };
    let a = route_fn(lower, topology);
    let b = route_fn(higher, topology);
    if a > b {
        return Err(ShardError::StateInconsistency(format!(
            "key {} routes to shard {} but larger key {} routes to shard {}",
            lower, a, higher, b
        )));
    }
    Ok(())
}

/// Invariant: every record lives on exactly one shard, the one routing picks.
pub fn invariant_single_owner<F>(
    listing: &ShardListing,
    topology: &Topology,
    route_fn: F,
) -> Result<(), ShardError>
where
    F: Fn(RecordId, &Topology) -> ShardIndex,
{
    let mut seen: HashMap<RecordId, ShardIndex> = HashMap::new();

    for (&shard, records) in listing {
        for record in records {
            if let Some(first) = seen.insert(record.id, shard) {
                return Err(ShardError::StateInconsistency(format!(
                    "record {} present on shards {} and {}",
                    record.id, first, shard
                )));
            }

            let owner = route_fn(record.id, topology);
            if owner != shard {
                return Err(ShardError::StateInconsistency(format!(
                    "record {} on shard {} but owned by shard {}",
                    record.id, shard, owner
                )));
            }
        }
    }

    Ok(())
}

/// Invariant: every migrated id ends up exactly once, on its owner.
///
/// Only the ids a rebalance touched are checked; records created or deleted
/// by clients during the run are not counted against it.
pub fn invariant_migrated_owned<F>(
    listing: &ShardListing,
    migrated: &[RecordId],
    topology: &Topology,
    route_fn: F,
) -> Result<(), ShardError>
where
    F: Fn(RecordId, &Topology) -> ShardIndex,
{
    for &id in migrated {
        let holders: Vec<ShardIndex> = listing
            .iter()
            .filter(|(_, records)| records.iter().any(|r| r.id == id))
            .map(|(&shard, _)| shard)
            .collect();

        let owner = route_fn(id, topology);
        if holders != [owner] {
            return Err(ShardError::StateInconsistency(format!(
                "migrated record {} held by shards {:?}, owner is shard {}",
                id, holders, owner
            )));
        }
    }
    Ok(())
}
