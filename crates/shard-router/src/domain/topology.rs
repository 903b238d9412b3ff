//! # Topology
//!
//! Versioned, append-only shard layout plus the routing parameters that
//! depend on it. A `Topology` value never changes; growth produces a new
//! version.

use super::entities::ShardDescriptor;
use super::errors::{RecordId, ShardError, ShardIndex};
use serde::{Deserialize, Serialize};

/// Strictly increasing inclusive upper bounds, one per shard except the
/// last (catch-all) shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTable {
    upper_bounds: Vec<RecordId>,
}

impl RangeTable {
    /// Validate and build a range table.
    pub fn new(upper_bounds: Vec<RecordId>) -> Result<Self, ShardError> {
        if let Some(pair) = upper_bounds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ShardError::Config(format!(
                "range bounds must be strictly increasing: {} >= {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { upper_bounds })
    }

    /// Upper bounds in shard order.
    pub fn upper_bounds(&self) -> &[RecordId] {
        &self.upper_bounds
    }

    /// Number of shards this table describes.
    pub fn shard_count(&self) -> usize {
        self.upper_bounds.len() + 1
    }

    /// Table for one more shard: the old catch-all gets `next_bound`.
    ///
    /// Without an explicit bound the last interval width is repeated, which
    /// needs at least two existing bounds.
    pub fn extended(&self, next_bound: Option<RecordId>) -> Result<Self, ShardError> {
        let bound = match next_bound {
            Some(bound) => bound,
            None => self.inferred_next_bound()?,
        };
        let mut upper_bounds = self.upper_bounds.clone();
        upper_bounds.push(bound);
        Self::new(upper_bounds)
    }

    fn inferred_next_bound(&self) -> Result<RecordId, ShardError> {
        match self.upper_bounds.as_slice() {
            [.., prev, last] => {
                let width = last.checked_sub(*prev).ok_or_else(|| {
                    ShardError::Config("range interval width overflows".to_string())
                })?;
                last.checked_add(width).ok_or_else(|| {
                    ShardError::Config("inferred range bound overflows".to_string())
                })
            }
            _ => Err(ShardError::Config(
                "range topology needs an explicit upper bound for the new shard".to_string(),
            )),
        }
    }
}

/// Key-to-shard routing variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Digest of the key modulo shard count.
    Hash,
    /// Fixed boundary table.
    Range(RangeTable),
}

impl RoutingStrategy {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Range(_) => "range",
        }
    }
}

/// Ordered shard descriptors plus routing parameters, at one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    version: u64,
    shards: Vec<ShardDescriptor>,
    strategy: RoutingStrategy,
}

impl Topology {
    /// Build the initial topology (version 1).
    pub fn new(shards: Vec<ShardDescriptor>, strategy: RoutingStrategy) -> Result<Self, ShardError> {
        Self::validated(1, shards, strategy)
    }

    /// Hash-routed topology.
    pub fn hashed(shards: Vec<ShardDescriptor>) -> Result<Self, ShardError> {
        Self::new(shards, RoutingStrategy::Hash)
    }

    /// Range-routed topology; `upper_bounds.len()` must be `shards.len() - 1`.
    pub fn ranged(
        shards: Vec<ShardDescriptor>,
        upper_bounds: Vec<RecordId>,
    ) -> Result<Self, ShardError> {
        Self::new(shards, RoutingStrategy::Range(RangeTable::new(upper_bounds)?))
    }

    fn validated(
        version: u64,
        shards: Vec<ShardDescriptor>,
        strategy: RoutingStrategy,
    ) -> Result<Self, ShardError> {
        if shards.is_empty() {
            return Err(ShardError::Config(
                "topology needs at least one shard".to_string(),
            ));
        }

        for (i, shard) in shards.iter().enumerate() {
            if shards[..i].iter().any(|earlier| earlier.collides_with(shard)) {
                return Err(ShardError::DescriptorCollision {
                    name: shard.name.clone(),
                    location: shard.location.clone(),
                });
            }
        }

        if let RoutingStrategy::Range(table) = &strategy {
            if table.shard_count() != shards.len() {
                return Err(ShardError::Config(format!(
                    "range table describes {} shards, topology has {}",
                    table.shard_count(),
                    shards.len()
                )));
            }
        }

        Ok(Self {
            version,
            shards,
            strategy,
        })
    }

    /// Topology version; starts at 1, +1 per added shard.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Descriptors in position order.
    pub fn shards(&self) -> &[ShardDescriptor] {
        &self.shards
    }

    /// Number of shards (always >= 1).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Descriptor at a position.
    pub fn descriptor(&self, index: ShardIndex) -> Result<&ShardDescriptor, ShardError> {
        self.shards.get(index).ok_or(ShardError::UnknownShard(index))
    }

    /// Routing parameters.
    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    /// Reject a descriptor that would address an existing shard.
    pub fn check_new_descriptor(&self, descriptor: &ShardDescriptor) -> Result<(), ShardError> {
        if self.shards.iter().any(|s| s.collides_with(descriptor)) {
            return Err(ShardError::DescriptorCollision {
                name: descriptor.name.clone(),
                location: descriptor.location.clone(),
            });
        }
        Ok(())
    }

    /// Next version with `descriptor` appended.
    ///
    /// `range_bound` only matters for range routing: it becomes the upper
    /// bound of the previous catch-all shard.
    pub fn with_shard(
        &self,
        descriptor: ShardDescriptor,
        range_bound: Option<RecordId>,
    ) -> Result<Self, ShardError> {
        self.check_new_descriptor(&descriptor)?;

        let strategy = match &self.strategy {
            RoutingStrategy::Hash => RoutingStrategy::Hash,
            RoutingStrategy::Range(table) => RoutingStrategy::Range(table.extended(range_bound)?),
        };

        let mut shards = self.shards.clone();
        shards.push(descriptor);
        Self::validated(self.version + 1, shards, strategy)
    }
}
