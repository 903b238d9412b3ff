//! # Inbound Ports
//!
//! API traits the request-handling layer calls.

use crate::domain::{
    RebalanceReport, Record, RecordId, RecordUpdate, ShardDescriptor, ShardError, ShardIndex,
    ShardListing, Topology,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Sharding API - inbound port.
///
/// Every call resolves the owning shard against a topology snapshot taken at
/// call start. All calls block on shard I/O.
pub trait ShardingApi: Send + Sync {
    /// Insert a record on its owning shard; returns that shard.
    fn create(&self, record: Record) -> Result<ShardIndex, ShardError>;

    /// Look up a record; reports the shard consulted even when absent.
    fn read(&self, id: RecordId) -> Result<(Option<Record>, ShardIndex), ShardError>;

    /// Apply a sparse update; `NotFound` when the id is absent.
    fn update(&self, id: RecordId, update: &RecordUpdate) -> Result<(Record, ShardIndex), ShardError>;

    /// Delete a record; `false` when it did not exist.
    fn delete(&self, id: RecordId) -> Result<bool, ShardError>;

    /// Records grouped by shard; every shard appears, empty ones included.
    fn list_all(&self) -> Result<ShardListing, ShardError>;

    /// Records on a single shard.
    fn list_shard(&self, index: ShardIndex) -> Result<Vec<Record>, ShardError>;

    /// Register a shard and rebalance onto it.
    fn add_shard(&self, descriptor: ShardDescriptor) -> Result<RebalanceReport, ShardError>;

    /// Re-run reconciliation against the current topology.
    fn rebalance(&self) -> Result<RebalanceReport, ShardError>;

    /// Current topology snapshot.
    fn topology(&self) -> Arc<Topology>;

    /// Current shard count.
    fn shard_count(&self) -> usize {
        self.topology().shard_count()
    }
}

/// Async sharding API - inbound port for async callers.
///
/// Same contract as [`ShardingApi`]; blocking work runs off the async
/// executor.
#[async_trait]
pub trait AsyncShardingApi: Send + Sync {
    /// See [`ShardingApi::create`].
    async fn create(&self, record: Record) -> Result<ShardIndex, ShardError>;

    /// See [`ShardingApi::read`].
    async fn read(&self, id: RecordId) -> Result<(Option<Record>, ShardIndex), ShardError>;

    /// See [`ShardingApi::update`].
    async fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> Result<(Record, ShardIndex), ShardError>;

    /// See [`ShardingApi::delete`].
    async fn delete(&self, id: RecordId) -> Result<bool, ShardError>;

    /// See [`ShardingApi::list_all`].
    async fn list_all(&self) -> Result<ShardListing, ShardError>;

    /// See [`ShardingApi::add_shard`].
    async fn add_shard(&self, descriptor: ShardDescriptor) -> Result<RebalanceReport, ShardError>;
}
