//! # SQLite Flows
//!
//! Reference scenarios over one SQLite file per shard.

#[cfg(test)]
mod tests {
    use crate::fixtures::{reference_bounds, sqlite_descriptors, sqlite_router};
    use shard_router::{
        route, Record, RecordUpdate, ShardDescriptor, ShardError, ShardingApi,
        SqliteBackendFactory, Topology,
    };
    use tempfile::TempDir;

    #[test]
    fn test_hash_scenario_with_growth() {
        let dir = TempDir::new().unwrap();
        let router = sqlite_router(
            dir.path(),
            Topology::hashed(sqlite_descriptors(4)).unwrap(),
        );

        for id in [101, 202, 303, 404] {
            router.create(Record::named(id, format!("user{}", id))).unwrap();
        }
        assert!(router.read(404).unwrap().0.is_some());
        assert!(router.delete(404).unwrap());

        let report = router
            .add_shard(ShardDescriptor::new(
                "shard5",
                SqliteBackendFactory::shard_file_name(4),
            ))
            .unwrap();
        assert_eq!(report.total_records(), 3);
        assert!(dir.path().join("shard_4.db").exists());

        let topology = router.topology();
        for id in [101, 202, 303] {
            let (record, shard) = router.read(id).unwrap();
            assert_eq!(record.unwrap().name.as_deref(), Some(format!("user{}", id).as_str()));
            assert_eq!(shard, route(id, &topology));
        }
    }

    #[test]
    fn test_range_scenario() {
        let dir = TempDir::new().unwrap();
        let router = sqlite_router(
            dir.path(),
            Topology::ranged(sqlite_descriptors(4), reference_bounds()).unwrap(),
        );

        router.create(Record::named(10, "a")).unwrap();
        router.create(Record::named(250, "b")).unwrap();

        let first: Vec<_> = router.list_shard(0).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(first, vec![10, 250]);
        for shard in 1..4 {
            assert!(router.list_shard(shard).unwrap().is_empty());
        }
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let topology = Topology::ranged(sqlite_descriptors(4), reference_bounds()).unwrap();

        {
            let router = sqlite_router(dir.path(), topology.clone());
            router.create(Record::named(600, "kept")).unwrap();
            router
                .update(600, &RecordUpdate::new().email("kept@x"))
                .unwrap();
        }

        let router = sqlite_router(dir.path(), topology);
        let (record, shard) = router.read(600).unwrap();
        let record = record.unwrap();
        assert_eq!(shard, 2);
        assert_eq!(record.email.as_deref(), Some("kept@x"));
    }

    #[test]
    fn test_duplicate_and_missing() {
        let dir = TempDir::new().unwrap();
        let router = sqlite_router(dir.path(), Topology::hashed(sqlite_descriptors(2)).unwrap());

        router.create(Record::named(7, "x")).unwrap();
        assert!(matches!(
            router.create(Record::named(7, "y")).unwrap_err(),
            ShardError::DuplicateKey { id: 7, .. }
        ));
        assert!(matches!(
            router.update(8, &RecordUpdate::new().name("z")).unwrap_err(),
            ShardError::NotFound { id: 8, .. }
        ));
        assert!(!router.delete(8).unwrap());
    }
}
