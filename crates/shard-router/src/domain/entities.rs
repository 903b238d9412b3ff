//! # Domain Entities
//!
//! Records, shard descriptors, router configuration and rebalance results.

use super::errors::{RecordId, ShardIndex};
use super::value_objects::{MigrationOrder, MigrationPhase, RecordUpdate, StepKind, RecordField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Records grouped by the shard that holds them.
pub type ShardListing = BTreeMap<ShardIndex, Vec<Record>>;

/// A routed entity. `id` is the partition key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Cluster-wide unique key.
    pub id: RecordId,
    /// Display name.
    pub name: Option<String>,
    /// Contact email; expected unique, not enforced across shards.
    pub email: Option<String>,
}

impl Record {
    /// Create a record.
    pub fn new(id: RecordId, name: Option<String>, email: Option<String>) -> Self {
        Self { id, name, email }
    }

    /// Record with a name only.
    pub fn named(id: RecordId, name: impl Into<String>) -> Self {
        Self::new(id, Some(name.into()), None)
    }

    /// Apply a sparse update in place.
    pub fn apply(&mut self, update: &RecordUpdate) {
        for assignment in update.assignments() {
            match assignment.field {
                RecordField::Name => self.name = assignment.value.clone(),
                RecordField::Email => self.email = assignment.value.clone(),
            }
        }
    }
}

/// Identity and connection target of one shard.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardDescriptor {
    /// Unique label (`shard1`, `eu-0`, ...).
    pub name: String,
    /// Opaque connection target, interpreted by the backend factory.
    pub location: String,
}

impl ShardDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Check whether two descriptors would address the same shard.
    pub fn collides_with(&self, other: &ShardDescriptor) -> bool {
        self.name == other.name || self.location == other.location
    }
}

/// Router configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Order of the two halves of a record move.
    pub migration_order: MigrationOrder,
    /// Readiness timeout for a newly provisioned shard.
    pub readiness_timeout_ms: u64,
    /// First readiness poll interval.
    pub readiness_poll_interval_ms: u64,
    /// Backoff cap for readiness polling.
    pub readiness_max_interval_ms: u64,
    /// Re-scan after each rebalance and check the single-owner invariant.
    pub verify_after_rebalance: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            migration_order: MigrationOrder::InsertThenDelete,
            readiness_timeout_ms: 30_000,
            readiness_poll_interval_ms: 1_000,
            readiness_max_interval_ms: 5_000,
            verify_after_rebalance: true,
        }
    }
}

impl RouterConfig {
    /// Create config for testing.
    pub fn for_testing() -> Self {
        Self {
            migration_order: MigrationOrder::InsertThenDelete,
            readiness_timeout_ms: 200,
            readiness_poll_interval_ms: 5,
            readiness_max_interval_ms: 20,
            verify_after_rebalance: true,
        }
    }

    /// Override the migration order.
    pub fn with_migration_order(mut self, order: MigrationOrder) -> Self {
        self.migration_order = order;
        self
    }
}

/// One journaled migration step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Rebalance run this step belongs to.
    pub run_id: Uuid,
    /// Topology version the run targets.
    pub topology_version: u64,
    /// Move or discard.
    pub kind: StepKind,
    /// Migrated record.
    pub record_id: RecordId,
    /// Shard the copy is taken from.
    pub from: ShardIndex,
    /// Owning shard.
    pub to: ShardIndex,
    /// Order used for the move.
    pub order: MigrationOrder,
    /// Phase reached.
    pub phase: MigrationPhase,
    /// Record payload for moves, so a lost record can be restored by hand.
    pub record: Option<Record>,
    /// Wall-clock timestamp (ms since epoch).
    pub at_ms: u64,
}

/// Summary of a finished rebalance run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Run identifier (journal correlation).
    pub run_id: Uuid,
    /// Topology version the run reconciled against.
    pub topology_version: u64,
    /// Record copies scanned across all shards.
    pub scanned: usize,
    /// Records moved to their owner.
    pub moved: usize,
    /// Stale duplicate copies removed.
    pub discarded: usize,
    /// Moves skipped because the source copy disappeared mid-run.
    pub skipped: usize,
    /// Record count per shard after the run.
    pub shard_sizes: BTreeMap<ShardIndex, usize>,
    /// Wall-clock duration.
    pub elapsed_ms: u64,
}

impl RebalanceReport {
    /// Total records across all shards after the run.
    pub fn total_records(&self) -> usize {
        self.shard_sizes.values().sum()
    }
}
