//! # CRUD Flows
//!
//! Routing totality and the steady-state CRUD contract through the public
//! router API.

#[cfg(test)]
mod tests {
    use crate::fixtures::{memory_descriptors, MemoryCluster};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shard_router::{
        invariant_deterministic_routing, invariant_range_monotonic, invariant_route_in_bounds,
        route, Record, RecordField, RecordId, RecordUpdate, ShardError, ShardingApi, Topology,
    };

    // =============================================================================
    // ROUTING PROPERTIES
    // =============================================================================

    #[test]
    fn test_routing_total_and_deterministic() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for shards in 1..=8 {
            let topology = Topology::hashed(memory_descriptors(shards)).unwrap();
            for _ in 0..500 {
                let key: RecordId = rng.gen();
                assert!(invariant_deterministic_routing(route, key, &topology));
                invariant_route_in_bounds(route(key, &topology), &topology).unwrap();
            }
        }
    }

    #[test]
    fn test_range_routing_monotonic() {
        let topology = Topology::ranged(memory_descriptors(4), vec![250, 500, 750]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..2_000 {
            let a: RecordId = rng.gen_range(-10_000..10_000);
            let b: RecordId = rng.gen_range(-10_000..10_000);
            invariant_range_monotonic(route, a, b, &topology).unwrap();
        }
    }

    // =============================================================================
    // CRUD CONTRACT
    // =============================================================================

    #[test]
    fn test_hash_reference_scenario() {
        let cluster = MemoryCluster::hashed(4);
        cluster.populate([101, 202, 303, 404]);

        let (found, shard) = cluster.router.read(404).unwrap();
        assert!(found.is_some());
        assert_eq!(shard, route(404, &cluster.router.topology()));

        assert!(cluster.router.delete(404).unwrap());
        assert!(cluster.router.read(404).unwrap().0.is_none());
        assert_eq!(cluster.total(), 3);
    }

    #[test]
    fn test_range_reference_scenario() {
        let cluster = MemoryCluster::ranged();
        cluster.populate([10, 250]);

        let listing = cluster.router.list_all().unwrap();
        let ids: Vec<_> = listing[&0].iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 250]);
        assert!((1..4).all(|shard| listing[&shard].is_empty()));
    }

    #[test]
    fn test_round_trip_lands_where_routed() {
        let cluster = MemoryCluster::hashed(5);
        let mut rng = StdRng::seed_from_u64(9);
        let topology = cluster.router.topology();

        for _ in 0..100 {
            let id: RecordId = rng.gen_range(0..i64::MAX);
            let record = Record::new(id, Some("n".into()), Some(format!("{}@x", id)));
            match cluster.router.create(record.clone()) {
                Ok(shard) => {
                    assert_eq!(shard, route(id, &topology));
                    assert_eq!(cluster.router.read(id).unwrap(), (Some(record), shard));
                }
                Err(ShardError::DuplicateKey { .. }) => {}
                Err(e) => panic!("unexpected error {}", e),
            }
        }
    }

    #[test]
    fn test_delete_idempotence() {
        let cluster = MemoryCluster::hashed(3);
        cluster.populate([5]);
        assert!(cluster.router.delete(5).unwrap());
        assert!(!cluster.router.delete(5).unwrap());
        assert!(!cluster.router.delete(5).unwrap());
    }

    #[test]
    fn test_update_partiality() {
        let cluster = MemoryCluster::hashed(3);
        cluster
            .router
            .create(Record::new(1, Some("Anna".into()), Some("anna@x".into())))
            .unwrap();

        let (record, _) = cluster
            .router
            .update(1, &RecordUpdate::new().name("X"))
            .unwrap();
        assert_eq!(record.name.as_deref(), Some("X"));
        assert_eq!(record.email.as_deref(), Some("anna@x"));

        let (record, _) = cluster
            .router
            .update(1, &RecordUpdate::new().clear(RecordField::Name))
            .unwrap();
        assert_eq!(record.name, None);
        assert_eq!(record.email.as_deref(), Some("anna@x"));
    }

    #[test]
    fn test_update_absent_is_not_found() {
        let cluster = MemoryCluster::hashed(3);
        let err = cluster
            .router
            .update(77, &RecordUpdate::new().email("e@x"))
            .unwrap_err();
        assert!(matches!(err, ShardError::NotFound { id: 77, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unreachable_shard_surfaces_connection_failure() {
        let cluster = MemoryCluster::ranged();
        cluster
            .router
            .factory()
            .backend("mem://0")
            .unwrap()
            .set_unreachable(true);

        let err = cluster.router.read(10).unwrap_err();
        assert!(matches!(err, ShardError::ConnectionFailure { .. }));
        assert!(err.is_retryable());

        // Other shards keep serving.
        assert!(cluster.router.read(900).unwrap().0.is_none());
    }
}
