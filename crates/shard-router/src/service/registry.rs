//! # Topology Registry
//!
//! Holds the current topology together with one backend handle per shard.
//! Readers clone an `Arc` under a short read lock; growth swaps in a new
//! version under the write lock.

use crate::domain::{RecordId, ShardDescriptor, ShardError, ShardIndex, Topology};
use crate::ports::outbound::ShardBackend;
use parking_lot::RwLock;
use std::sync::Arc;

/// Topology version plus the backends it addresses, index-aligned.
pub struct ShardSet {
    topology: Arc<Topology>,
    backends: Vec<Arc<dyn ShardBackend>>,
}

impl ShardSet {
    /// Pair a topology with its backends.
    pub fn new(topology: Topology, backends: Vec<Arc<dyn ShardBackend>>) -> Result<Self, ShardError> {
        if backends.len() != topology.shard_count() {
            return Err(ShardError::Config(format!(
                "{} backends for {} shards",
                backends.len(),
                topology.shard_count()
            )));
        }
        Ok(Self {
            topology: Arc::new(topology),
            backends,
        })
    }

    /// Topology at this version.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Backend at a shard index.
    pub fn backend(&self, index: ShardIndex) -> Result<&Arc<dyn ShardBackend>, ShardError> {
        self.backends.get(index).ok_or(ShardError::UnknownShard(index))
    }

    /// Backends in shard order.
    pub fn backends(&self) -> &[Arc<dyn ShardBackend>] {
        &self.backends
    }
}

/// Versioned, append-only shard registry.
pub struct TopologyRegistry {
    current: RwLock<Arc<ShardSet>>,
}

impl TopologyRegistry {
    /// Registry starting at `initial`.
    pub fn new(initial: ShardSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Snapshot pinned for the duration of one call.
    pub fn snapshot(&self) -> Arc<ShardSet> {
        Arc::clone(&self.current.read())
    }

    /// Append a shard and publish the next version.
    ///
    /// Callers serialize growth externally; the write lock only guards the
    /// swap itself.
    pub fn append(
        &self,
        descriptor: ShardDescriptor,
        range_bound: Option<RecordId>,
        backend: Arc<dyn ShardBackend>,
    ) -> Result<Arc<ShardSet>, ShardError> {
        let mut current = self.current.write();

        let topology = current.topology.with_shard(descriptor, range_bound)?;
        let mut backends = current.backends.clone();
        backends.push(backend);

        let next = Arc::new(ShardSet::new(topology, backends)?);
        *current = Arc::clone(&next);
        Ok(next)
    }
}
