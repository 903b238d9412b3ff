//! # Rebalancer
//!
//! Moves every record onto the shard the current topology routes it to.
//!
//! ## Run
//!
//! 1. Scan every shard
//! 2. Plan moves and duplicate discards (pure)
//! 3. Execute steps one at a time, journaling each phase before acting
//! 4. Optionally re-scan and verify single ownership
//!
//! The two halves of a move hit different stores with no shared
//! transaction. A failure between them is reported as
//! `PartialRebalanceFailure` naming the half that completed, and the run
//! stops.

use super::registry::ShardSet;
use crate::algorithms::{plan_rebalance, route, Migration};
use crate::domain::{
    invariant_migrated_owned, invariant_single_owner, JournalEntry, MigrationOrder,
    MigrationPhase, RebalanceReport, Record, RouterConfig, ShardError, ShardListing,
};
use crate::ports::outbound::{MigrationJournal, ShardBackend};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of one executed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepOutcome {
    Moved,
    Discarded,
    Skipped,
}

/// Executes rebalance runs against a pinned shard set.
pub struct Rebalancer<'a> {
    journal: &'a dyn MigrationJournal,
    config: &'a RouterConfig,
}

/// Per-run context threaded through journal writes.
struct RunContext<'s> {
    run_id: Uuid,
    shards: &'s ShardSet,
}

impl<'a> Rebalancer<'a> {
    /// Create a rebalancer.
    pub fn new(journal: &'a dyn MigrationJournal, config: &'a RouterConfig) -> Self {
        Self { journal, config }
    }

    /// Reconcile `shards` against its own topology.
    pub fn run(&self, shards: &ShardSet) -> Result<RebalanceReport, ShardError> {
        let started = Instant::now();
        let topology = shards.topology();
        let ctx = RunContext {
            run_id: Uuid::new_v4(),
            shards,
        };

        let listing = scan(shards)?;
        let plan = plan_rebalance(&listing, topology);

        info!(
            run_id = %ctx.run_id,
            topology_version = topology.version(),
            strategy = topology.strategy().label(),
            shards = topology.shard_count(),
            scanned = plan.scanned,
            moves = plan.moves(),
            discards = plan.discards(),
            order = %self.config.migration_order,
            "rebalance started"
        );

        let (mut moved, mut discarded, mut skipped) = (0, 0, 0);
        let mut migrated = Vec::with_capacity(plan.migrations.len());
        for migration in &plan.migrations {
            match self.execute(&ctx, migration)? {
                StepOutcome::Moved => moved += 1,
                StepOutcome::Discarded => discarded += 1,
                StepOutcome::Skipped => {
                    skipped += 1;
                    continue;
                }
            }
            migrated.push(migration.record_id());
        }

        let after = scan(shards)?;
        if self.config.verify_after_rebalance {
            invariant_single_owner(&after, topology, route)?;
            migrated.dedup();
            invariant_migrated_owned(&after, &migrated, topology, route)?;
        }

        let report = RebalanceReport {
            run_id: ctx.run_id,
            topology_version: topology.version(),
            scanned: plan.scanned,
            moved,
            discarded,
            skipped,
            shard_sizes: after.iter().map(|(&i, r)| (i, r.len())).collect(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %report.run_id,
            topology_version = report.topology_version,
            moved,
            discarded,
            skipped,
            total = report.total_records(),
            elapsed_ms = report.elapsed_ms,
            "rebalance finished"
        );
        Ok(report)
    }

    fn execute(&self, ctx: &RunContext<'_>, migration: &Migration) -> Result<StepOutcome, ShardError> {
        match migration {
            Migration::Move { record, .. } => self.execute_move(ctx, migration, record),
            Migration::Discard { .. } => self.execute_discard(ctx, migration),
        }
    }

    fn execute_move(
        &self,
        ctx: &RunContext<'_>,
        migration: &Migration,
        scanned: &Record,
    ) -> Result<StepOutcome, ShardError> {
        let (id, from, to) = (migration.record_id(), migration.from(), migration.to());
        let source = ctx.shards.backend(from)?;
        let target = ctx.shards.backend(to)?;
        let order = self.config.migration_order;

        self.journal(ctx, migration, MigrationPhase::Planned, Some(scanned))?;

        // Re-read so a concurrent update is carried over.
        let record = match source.get(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(record_id = id, from, to, "source copy gone, skipping move");
                self.journal_after(ctx, migration, MigrationPhase::Skipped, Some(scanned));
                return Ok(StepOutcome::Skipped);
            }
            Err(e) => return Err(self.abort(ctx, migration, Some(scanned), e)),
        };

        let first = match order {
            MigrationOrder::InsertThenDelete => insert_owner_wins(target.as_ref(), &record),
            MigrationOrder::DeleteThenInsert => match source.delete(id) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    self.journal_after(ctx, migration, MigrationPhase::Skipped, Some(&record));
                    return Ok(StepOutcome::Skipped);
                }
                Err(e) => Err(e),
            },
        };
        if let Err(e) = first {
            return Err(self.abort(ctx, migration, Some(&record), e));
        }
        self.journal_after(ctx, migration, MigrationPhase::FirstHalfApplied, Some(&record));

        let second = match order {
            MigrationOrder::InsertThenDelete => source.delete(id).map(|_| ()),
            MigrationOrder::DeleteThenInsert => insert_owner_wins(target.as_ref(), &record),
        };
        if let Err(e) = second {
            self.journal_after(ctx, migration, MigrationPhase::Failed, Some(&record));
            let applied = order.first_half();
            error!(
                run_id = %ctx.run_id,
                record_id = id,
                from,
                to,
                applied = %applied,
                error = %e,
                "partial rebalance failure, record needs reconciliation"
            );
            return Err(ShardError::PartialRebalanceFailure {
                record_id: id,
                from,
                to,
                applied,
                reason: e.to_string(),
            });
        }

        self.journal_after(ctx, migration, MigrationPhase::Completed, Some(&record));
        debug!(record_id = id, from, to, "record moved");
        Ok(StepOutcome::Moved)
    }

    fn execute_discard(&self, ctx: &RunContext<'_>, migration: &Migration) -> Result<StepOutcome, ShardError> {
        let (id, from, to) = (migration.record_id(), migration.from(), migration.to());
        let source = ctx.shards.backend(from)?;
        let owner = ctx.shards.backend(to)?;

        // The owner copy may be gone (an earlier move of this id was skipped);
        // the copy here is then the last one and moves instead.
        match owner.get(id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return match source.get(id) {
                    Ok(Some(record)) => {
                        debug!(record_id = id, from, to, "owner copy missing, moving instead");
                        self.execute_move(ctx, migration, &record)
                    }
                    Ok(None) => {
                        self.journal(ctx, migration, MigrationPhase::Skipped, None)?;
                        Ok(StepOutcome::Skipped)
                    }
                    Err(e) => Err(self.abort(ctx, migration, None, e)),
                };
            }
            Err(e) => return Err(self.abort(ctx, migration, None, e)),
        }

        self.journal(ctx, migration, MigrationPhase::Planned, None)?;
        if let Err(e) = source.delete(id) {
            return Err(self.abort(ctx, migration, None, e));
        }
        self.journal_after(ctx, migration, MigrationPhase::Completed, None);

        warn!(record_id = id, from, owner = to, "discarded duplicate copy");
        Ok(StepOutcome::Discarded)
    }

    /// First half failed: nothing changed for this record, stop the run.
    fn abort(
        &self,
        ctx: &RunContext<'_>,
        migration: &Migration,
        record: Option<&Record>,
        cause: ShardError,
    ) -> ShardError {
        self.journal_after(ctx, migration, MigrationPhase::Failed, record);
        warn!(
            run_id = %ctx.run_id,
            record_id = migration.record_id(),
            from = migration.from(),
            to = migration.to(),
            error = %cause,
            "rebalance aborted"
        );
        ShardError::RebalanceAborted {
            record_id: migration.record_id(),
            from: migration.from(),
            to: migration.to(),
            reason: cause.to_string(),
        }
    }

    fn journal(
        &self,
        ctx: &RunContext<'_>,
        migration: &Migration,
        phase: MigrationPhase,
        record: Option<&Record>,
    ) -> Result<(), ShardError> {
        self.journal.record(&JournalEntry {
            run_id: ctx.run_id,
            topology_version: ctx.shards.topology().version(),
            kind: migration.kind(),
            record_id: migration.record_id(),
            from: migration.from(),
            to: migration.to(),
            order: self.config.migration_order,
            phase,
            record: record.cloned(),
            at_ms: now_ms(),
        })
    }

    /// Journal a phase reached after a mutation. The mutation already
    /// happened, so a write failure is logged rather than returned; the step
    /// then shows up as unfinished, never as falsely completed.
    fn journal_after(
        &self,
        ctx: &RunContext<'_>,
        migration: &Migration,
        phase: MigrationPhase,
        record: Option<&Record>,
    ) {
        if let Err(e) = self.journal(ctx, migration, phase, record) {
            warn!(
                run_id = %ctx.run_id,
                record_id = migration.record_id(),
                phase = %phase,
                error = %e,
                "journal write failed"
            );
        }
    }
}

/// Insert onto the owner. An existing owner copy wins over the one being
/// moved.
fn insert_owner_wins(
    target: &dyn ShardBackend,
    record: &Record,
) -> Result<(), ShardError> {
    match target.insert(record) {
        Err(ShardError::DuplicateKey { id, shard }) => {
            warn!(record_id = id, shard = %shard, "owner already holds a copy");
            Ok(())
        }
        other => other,
    }
}

/// Full scan, every shard present even when empty.
pub fn scan(shards: &ShardSet) -> Result<ShardListing, ShardError> {
    shards
        .backends()
        .iter()
        .enumerate()
        .map(|(i, backend)| backend.list_all().map(|records| (i, records)))
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
