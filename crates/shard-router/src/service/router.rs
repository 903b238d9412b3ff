//! # Shard Router
//!
//! Routes CRUD to the owning shard and grows the topology.
//!
//! ## Concurrency
//!
//! - CRUD pins a topology snapshot at call start and never blocks growth.
//! - `add_shard` and `rebalance` hold the reshard mutex for their whole run,
//!   so at most one rebalance executes per router.
//! - Reads racing a rebalance may see a record missing or duplicated.

use super::provisioning::wait_until_ready;
use super::rebalancer::Rebalancer;
use super::registry::{ShardSet, TopologyRegistry};
use crate::adapters::journal::TracingJournal;
use crate::algorithms::route;
use crate::domain::{
    RebalanceReport, Record, RecordId, RecordUpdate, RouterConfig, ShardDescriptor, ShardError,
    ShardIndex, ShardListing, Topology,
};
use crate::ports::inbound::ShardingApi;
use crate::ports::outbound::{
    BackendFactory, MigrationJournal, NoopProvisioner, ShardBackend, ShardProvisioner,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Shard router over backends produced by `F`.
pub struct ShardRouter<F: BackendFactory> {
    registry: TopologyRegistry,
    factory: F,
    journal: Arc<dyn MigrationJournal>,
    provisioner: Arc<dyn ShardProvisioner>,
    config: RouterConfig,
    reshard_lock: Mutex<()>,
}

impl<F: BackendFactory> ShardRouter<F> {
    /// Open every shard of `topology` and ensure its schema.
    pub fn new(topology: Topology, factory: F, config: RouterConfig) -> Result<Self, ShardError> {
        let backends = topology
            .shards()
            .iter()
            .map(|descriptor| {
                let backend = factory.open(descriptor)?;
                backend.ensure_schema()?;
                Ok(backend)
            })
            .collect::<Result<Vec<Arc<dyn ShardBackend>>, ShardError>>()?;

        info!(
            shards = topology.shard_count(),
            strategy = topology.strategy().label(),
            version = topology.version(),
            "shard router initialized"
        );

        Ok(Self {
            registry: TopologyRegistry::new(ShardSet::new(topology, backends)?),
            factory,
            journal: Arc::new(TracingJournal),
            provisioner: Arc::new(NoopProvisioner),
            config,
            reshard_lock: Mutex::new(()),
        })
    }

    /// Replace the migration journal.
    pub fn with_journal(mut self, journal: Arc<dyn MigrationJournal>) -> Self {
        self.journal = journal;
        self
    }

    /// Replace the shard provisioner.
    pub fn with_provisioner(mut self, provisioner: Arc<dyn ShardProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Backend factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Shard the current topology routes `id` to.
    pub fn locate(&self, id: RecordId) -> ShardIndex {
        route(id, self.registry.snapshot().topology())
    }

    /// Add a shard with an explicit range bound for the previous catch-all
    /// shard. Hash topologies ignore the bound.
    pub fn add_shard_with_bound(
        &self,
        descriptor: ShardDescriptor,
        upper_bound: RecordId,
    ) -> Result<RebalanceReport, ShardError> {
        self.grow(descriptor, Some(upper_bound))
    }

    fn grow(
        &self,
        descriptor: ShardDescriptor,
        range_bound: Option<RecordId>,
    ) -> Result<RebalanceReport, ShardError> {
        let _reshard = self.reshard_lock.lock();
        let current = self.registry.snapshot();

        // Reject collisions and bad range bounds before touching anything.
        current.topology().with_shard(descriptor.clone(), range_bound)?;

        info!(
            name = %descriptor.name,
            location = %descriptor.location,
            from_version = current.topology().version(),
            "adding shard"
        );

        self.provisioner.provision(&descriptor)?;
        let backend = self.factory.open(&descriptor)?;
        wait_until_ready(backend.as_ref(), &self.config)?;
        backend.ensure_schema()?;

        let next = self.registry.append(descriptor, range_bound, backend)?;
        info!(
            version = next.topology().version(),
            shards = next.topology().shard_count(),
            "topology updated"
        );

        Rebalancer::new(self.journal.as_ref(), &self.config).run(&next)
    }

    fn owner(&self, set: &ShardSet, id: RecordId) -> Result<(ShardIndex, Arc<dyn ShardBackend>), ShardError> {
        let index = route(id, set.topology());
        Ok((index, Arc::clone(set.backend(index)?)))
    }
}

impl<F: BackendFactory> ShardingApi for ShardRouter<F> {
    fn create(&self, record: Record) -> Result<ShardIndex, ShardError> {
        let set = self.registry.snapshot();
        let (index, backend) = self.owner(&set, record.id)?;
        debug!(id = record.id, shard = index, "create");
        backend.insert(&record)?;
        Ok(index)
    }

    fn read(&self, id: RecordId) -> Result<(Option<Record>, ShardIndex), ShardError> {
        let set = self.registry.snapshot();
        let (index, backend) = self.owner(&set, id)?;
        debug!(id, shard = index, "read");
        Ok((backend.get(id)?, index))
    }

    fn update(&self, id: RecordId, update: &RecordUpdate) -> Result<(Record, ShardIndex), ShardError> {
        let set = self.registry.snapshot();
        let (index, backend) = self.owner(&set, id)?;
        debug!(id, shard = index, fields = update.assignments().len(), "update");
        Ok((backend.update(id, update)?, index))
    }

    fn delete(&self, id: RecordId) -> Result<bool, ShardError> {
        let set = self.registry.snapshot();
        let (index, backend) = self.owner(&set, id)?;
        debug!(id, shard = index, "delete");
        backend.delete(id)
    }

    fn list_all(&self) -> Result<ShardListing, ShardError> {
        super::rebalancer::scan(&self.registry.snapshot())
    }

    fn list_shard(&self, index: ShardIndex) -> Result<Vec<Record>, ShardError> {
        self.registry.snapshot().backend(index)?.list_all()
    }

    fn add_shard(&self, descriptor: ShardDescriptor) -> Result<RebalanceReport, ShardError> {
        self.grow(descriptor, None)
    }

    fn rebalance(&self) -> Result<RebalanceReport, ShardError> {
        let _reshard = self.reshard_lock.lock();
        let current = self.registry.snapshot();
        Rebalancer::new(self.journal.as_ref(), &self.config).run(&current)
    }

    fn topology(&self) -> Arc<Topology> {
        Arc::clone(self.registry.snapshot().topology())
    }
}
