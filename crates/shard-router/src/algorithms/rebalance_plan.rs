//! # Rebalance Planning
//!
//! Turns a full-cluster scan into an ordered list of migration steps.
//!
//! Ids are unique cluster-wide. A scan can still show several copies of one
//! id when an insert-first move was interrupted; the copy on the owning
//! shard wins and the others are discarded.

use super::routing::route;
use crate::domain::{Record, RecordId, ShardIndex, ShardListing, StepKind, Topology};
use std::collections::BTreeMap;

/// A single migration step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Migration {
    /// Copy the record to its owner, then remove it from `from`.
    Move {
        /// Record payload as scanned.
        record: Record,
        /// Current shard.
        from: ShardIndex,
        /// Owning shard.
        to: ShardIndex,
    },
    /// Remove a stale duplicate from `from`; the owner already has a copy
    /// (or receives one from a `Move` earlier in the plan).
    Discard {
        /// Duplicated id.
        record_id: RecordId,
        /// Shard holding the stale copy.
        from: ShardIndex,
        /// Owning shard.
        owner: ShardIndex,
    },
}

impl Migration {
    /// Record id the step touches.
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Move { record, .. } => record.id,
            Self::Discard { record_id, .. } => *record_id,
        }
    }

    /// Source shard.
    pub fn from(&self) -> ShardIndex {
        match self {
            Self::Move { from, .. } | Self::Discard { from, .. } => *from,
        }
    }

    /// Owning shard.
    pub fn to(&self) -> ShardIndex {
        match self {
            Self::Move { to, .. } => *to,
            Self::Discard { owner, .. } => *owner,
        }
    }

    /// Step kind for the journal.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Move { .. } => StepKind::Move,
            Self::Discard { .. } => StepKind::Discard,
        }
    }
}

/// Ordered migration steps for one topology version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    /// Record copies seen in the scan.
    pub scanned: usize,
    /// Steps, ordered by record id (moves before discards of the same id).
    pub migrations: Vec<Migration>,
}

impl RebalancePlan {
    /// True when every record already sits on its owner.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Number of move steps.
    pub fn moves(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| matches!(m, Migration::Move { .. }))
            .count()
    }

    /// Number of discard steps.
    pub fn discards(&self) -> usize {
        self.migrations.len() - self.moves()
    }

    /// Distinct records after the plan executes.
    pub fn distinct_records(&self) -> usize {
        self.scanned - self.discards()
    }
}

/// Compute the steps that restore the single-owner invariant under
/// `topology`.
pub fn plan_rebalance(listing: &ShardListing, topology: &Topology) -> RebalancePlan {
    let mut copies: BTreeMap<RecordId, Vec<(ShardIndex, &Record)>> = BTreeMap::new();
    let mut scanned = 0;

    for (&shard, records) in listing {
        for record in records {
            copies.entry(record.id).or_default().push((shard, record));
            scanned += 1;
        }
    }

    let mut migrations = Vec::new();

    for (id, mut holders) in copies {
        let owner = route(id, topology);
        holders.sort_by_key(|(shard, _)| *shard);

        let owner_has_copy = holders.iter().any(|(shard, _)| *shard == owner);
        let mut moved = owner_has_copy;

        for (shard, record) in holders {
            if shard == owner {
                continue;
            }
            if !moved {
                migrations.push(Migration::Move {
                    record: record.clone(),
                    from: shard,
                    to: owner,
                });
                moved = true;
            } else {
                migrations.push(Migration::Discard {
                    record_id: id,
                    from: shard,
                    owner,
                });
            }
        }
    }

    RebalancePlan {
        scanned,
        migrations,
    }
}

/// Records per shard that routing would place elsewhere.
pub fn find_misplaced(listing: &ShardListing, topology: &Topology) -> Vec<(ShardIndex, RecordId)> {
    listing
        .iter()
        .flat_map(|(&shard, records)| {
            records
                .iter()
                .filter(move |r| route(r.id, topology) != shard)
                .map(move |r| (shard, r.id))
        })
        .collect()
}
