//! # Rebalance Flows
//!
//! Topology growth, migration ordering, partial failures and
//! reconciliation.

#[cfg(test)]
mod tests {
    use crate::fixtures::{memory_descriptors, reference_bounds, MemoryCluster};
    use shard_router::{
        invariant_single_owner, route, AppliedHalf, AsyncShardRouter, AsyncShardingApi,
        BackendFactory, JsonLinesJournal, MigrationOrder, MigrationPhase, RouterConfig,
        ShardDescriptor, ShardError, ShardProvisioner, ShardingApi, StepKind, Topology,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fifth() -> ShardDescriptor {
        ShardDescriptor::new("shard5", "mem://4")
    }

    // =============================================================================
    // GROWTH
    // =============================================================================

    #[test]
    fn test_growth_preserves_count_and_placement() {
        let cluster = MemoryCluster::hashed(4);
        cluster.populate(1..=500);

        let report = cluster.router.add_shard(fifth()).unwrap();
        assert_eq!(report.total_records(), 500);
        assert_eq!(cluster.total(), 500);

        let topology = cluster.router.topology();
        invariant_single_owner(&cluster.router.list_all().unwrap(), &topology, route).unwrap();
        for id in 1..=500 {
            assert_eq!(cluster.router.read(id).unwrap().1, route(id, &topology));
        }
    }

    #[test]
    fn test_successive_growth_bumps_version() {
        let cluster = MemoryCluster::hashed(2);
        cluster.populate(0..100);

        for n in 3..=6 {
            let report = cluster
                .router
                .add_shard(ShardDescriptor::new(format!("shard{}", n), format!("mem://{}", n - 1)))
                .unwrap();
            assert_eq!(report.topology_version, (n - 1) as u64);
        }
        assert_eq!(cluster.router.shard_count(), 6);
        assert_eq!(cluster.total(), 100);
    }

    #[test]
    fn test_range_growth_only_moves_catch_all() {
        let cluster = MemoryCluster::ranged();
        cluster.populate([10, 300, 600, 800, 950, 1100]);

        let report = cluster.router.add_shard(fifth()).unwrap();
        assert_eq!(report.moved, 1);
        assert_eq!(cluster.router.read(1100).unwrap().1, 4);
        assert_eq!(cluster.router.read(950).unwrap().1, 3);
    }

    #[test]
    fn test_journal_planned_before_mutation() {
        let cluster = MemoryCluster::ranged();
        cluster.populate([1100]);
        cluster.router.add_shard(fifth()).unwrap();

        let entries = cluster.journal.entries();
        let phases: Vec<_> = entries.iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![
                MigrationPhase::Planned,
                MigrationPhase::FirstHalfApplied,
                MigrationPhase::Completed
            ]
        );
        assert!(entries.iter().all(|e| e.topology_version == 2));
        assert_eq!(entries[0].kind, StepKind::Move);
    }

    // =============================================================================
    // FAILURES
    // =============================================================================

    #[test]
    fn test_insert_first_failure_duplicates_then_reconciles() {
        let cluster = MemoryCluster::ranged();
        cluster.populate([1100]);
        let catch_all = cluster.router.factory().backend("mem://3").unwrap();
        catch_all.fail_deletes_after(0);

        match cluster.router.add_shard(fifth()).unwrap_err() {
            ShardError::PartialRebalanceFailure {
                record_id, applied, ..
            } => {
                assert_eq!(record_id, 1100);
                assert_eq!(applied, AppliedHalf::InsertedIntoTarget);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cluster.total(), 2);

        catch_all.clear_faults();
        let report = cluster.router.rebalance().unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(cluster.total(), 1);
    }

    #[test]
    fn test_delete_first_failure_reports_deleted_half() {
        let cluster = MemoryCluster::new(
            Topology::ranged(memory_descriptors(4), reference_bounds()).unwrap(),
            RouterConfig::for_testing().with_migration_order(MigrationOrder::DeleteThenInsert),
        );
        cluster.populate([1100]);

        // The new shard exists before growth so a fault can be armed on it.
        cluster.router.factory().open(&fifth()).unwrap();
        let target = cluster.router.factory().backend("mem://4").unwrap();
        target.fail_inserts_after(0);

        let err = cluster.router.add_shard(fifth()).unwrap_err();
        assert!(matches!(
            err,
            ShardError::PartialRebalanceFailure {
                applied: AppliedHalf::DeletedFromSource,
                ..
            }
        ));

        let planned = &cluster.journal.entries()[0];
        assert_eq!(planned.phase, MigrationPhase::Planned);
        assert_eq!(planned.record.as_ref().map(|r| r.id), Some(1100));
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let cluster = MemoryCluster::ranged();
        cluster.populate([1100, 1200, 1300]);
        let catch_all = cluster.router.factory().backend("mem://3").unwrap();
        catch_all.fail_deletes_after(1);

        assert!(cluster.router.add_shard(fifth()).is_err());
        let moved: Vec<_> = cluster
            .journal
            .entries()
            .iter()
            .filter(|e| e.phase == MigrationPhase::Completed)
            .map(|e| e.record_id)
            .collect();
        assert_eq!(moved, vec![1100]);
        assert!(cluster
            .journal
            .entries()
            .iter()
            .all(|e| e.record_id != 1300));
    }

    #[test]
    fn test_json_journal_pending_until_reconciled() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(JsonLinesJournal::new(dir.path().join("migrations.jsonl")));
        let cluster = MemoryCluster::ranged();
        cluster.populate([1100, 1200]);
        let router = cluster.router.with_journal(journal.clone());

        let catch_all = router.factory().backend("mem://3").unwrap();
        catch_all.fail_deletes_after(1);
        assert!(router.add_shard(fifth()).is_err());

        let pending = journal.pending_migrations().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_id, 1200);
        assert_eq!(pending[0].phase, MigrationPhase::Failed);

        catch_all.clear_faults();
        let report = router.rebalance().unwrap();
        assert_eq!(report.discarded, 1);
        assert!(journal.pending_migrations().unwrap().is_empty());
        assert_eq!(router.list_shard(4).unwrap().len(), 2);
        assert!(router.list_shard(3).unwrap().is_empty());
    }

    // =============================================================================
    // PROVISIONING
    // =============================================================================

    #[test]
    fn test_unready_shard_leaves_topology_unchanged() {
        let cluster = MemoryCluster::hashed(3);
        cluster.populate(0..30);
        let descriptor = ShardDescriptor::new("shard4", "mem://3");
        cluster.router.factory().open(&descriptor).unwrap();
        cluster
            .router
            .factory()
            .backend("mem://3")
            .unwrap()
            .set_unreachable(true);

        let err = cluster.router.add_shard(descriptor).unwrap_err();
        assert!(matches!(err, ShardError::ProvisioningTimeout { .. }));
        assert_eq!(cluster.router.topology().version(), 1);
        assert_eq!(cluster.router.shard_count(), 3);
        assert_eq!(cluster.total(), 30);
    }

    struct CountingProvisioner(AtomicUsize);

    impl ShardProvisioner for CountingProvisioner {
        fn provision(&self, _descriptor: &ShardDescriptor) -> Result<(), ShardError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_provisioner_called_once_per_add() {
        let provisioner = Arc::new(CountingProvisioner(AtomicUsize::new(0)));
        let cluster = MemoryCluster::hashed(3);
        let router = cluster.router.with_provisioner(provisioner.clone());

        router.add_shard(ShardDescriptor::new("shard4", "mem://3")).unwrap();
        assert_eq!(provisioner.0.load(Ordering::SeqCst), 1);

        assert!(router
            .add_shard(ShardDescriptor::new("shard4", "mem://9"))
            .is_err());
        assert_eq!(provisioner.0.load(Ordering::SeqCst), 1);
    }

    // =============================================================================
    // ASYNC FACADE
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_reads_during_growth() {
        let cluster = MemoryCluster::hashed(3);
        cluster.populate(0..200);
        let router = AsyncShardRouter::new(Arc::new(cluster.router));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move {
                    for id in 0..200 {
                        router.read(id).await.unwrap();
                    }
                })
            })
            .collect();

        let report = router
            .add_shard(ShardDescriptor::new("shard4", "mem://3"))
            .await
            .unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(report.total_records(), 200);
        for id in 0..200 {
            assert!(router.read(id).await.unwrap().0.is_some());
        }
    }
}
