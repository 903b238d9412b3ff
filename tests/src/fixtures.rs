//! Router builders shared by the flows and benchmarks.

use shard_router::{
    InMemoryBackendFactory, InMemoryJournal, Record, RecordId, RouterConfig, ShardDescriptor,
    ShardRouter, ShardingApi, SqliteBackendFactory, SqliteConfig, Topology,
};
use std::path::Path;
use std::sync::Arc;

/// `n` descriptors named `shard1..` with `mem://` locations.
pub fn memory_descriptors(n: usize) -> Vec<ShardDescriptor> {
    (0..n)
        .map(|i| ShardDescriptor::new(format!("shard{}", i + 1), format!("mem://{}", i)))
        .collect()
}

/// `n` descriptors named `shard1..` with `shard_<i>.db` locations.
pub fn sqlite_descriptors(n: usize) -> Vec<ShardDescriptor> {
    (0..n)
        .map(|i| {
            ShardDescriptor::new(
                format!("shard{}", i + 1),
                SqliteBackendFactory::shard_file_name(i),
            )
        })
        .collect()
}

/// The 250/500/750/catch-all layout.
pub fn reference_bounds() -> Vec<RecordId> {
    vec![250, 500, 750]
}

/// In-memory router plus its journal.
pub struct MemoryCluster {
    /// Router under test
    pub router: ShardRouter<InMemoryBackendFactory>,
    /// Journal the router writes to
    pub journal: Arc<InMemoryJournal>,
}

impl MemoryCluster {
    /// Build over `topology` with test timings.
    pub fn new(topology: Topology, config: RouterConfig) -> Self {
        let journal = Arc::new(InMemoryJournal::new());
        let router = ShardRouter::new(topology, InMemoryBackendFactory::new(), config)
            .expect("in-memory router")
            .with_journal(journal.clone());
        Self { router, journal }
    }

    /// Hash-routed cluster of `n` shards.
    pub fn hashed(n: usize) -> Self {
        Self::new(
            Topology::hashed(memory_descriptors(n)).expect("hash topology"),
            RouterConfig::for_testing(),
        )
    }

    /// Range-routed cluster on the reference bounds.
    pub fn ranged() -> Self {
        Self::new(
            Topology::ranged(memory_descriptors(4), reference_bounds()).expect("range topology"),
            RouterConfig::for_testing(),
        )
    }

    /// Insert `ids` with generated names.
    pub fn populate(&self, ids: impl IntoIterator<Item = RecordId>) {
        for id in ids {
            self.router
                .create(Record::named(id, format!("user{}", id)))
                .expect("populate");
        }
    }

    /// Total records across shards.
    pub fn total(&self) -> usize {
        self.router
            .list_all()
            .expect("list_all")
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// SQLite router rooted at `dir`.
pub fn sqlite_router(dir: &Path, topology: Topology) -> ShardRouter<SqliteBackendFactory> {
    ShardRouter::new(
        topology,
        SqliteBackendFactory::new(dir, SqliteConfig::for_testing()),
        RouterConfig::for_testing(),
    )
    .expect("sqlite router")
}
