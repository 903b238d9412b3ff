//! Async facade over the blocking router.
//!
//! Each call runs on tokio's blocking pool so shard I/O never stalls an
//! executor thread.

use crate::domain::{
    RebalanceReport, Record, RecordId, RecordUpdate, ShardDescriptor, ShardError, ShardIndex,
    ShardListing,
};
use crate::ports::inbound::{AsyncShardingApi, ShardingApi};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs a shared [`ShardingApi`] on the blocking pool.
pub struct AsyncShardRouter<R: ShardingApi + 'static> {
    inner: Arc<R>,
}

impl<R: ShardingApi + 'static> Clone for AsyncShardRouter<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ShardingApi + 'static> AsyncShardRouter<R> {
    /// Wrap a router.
    pub fn new(inner: Arc<R>) -> Self {
        Self { inner }
    }

    /// The wrapped blocking router.
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    async fn blocking<T, Op>(&self, op: Op) -> Result<T, ShardError>
    where
        T: Send + 'static,
        Op: FnOnce(&R) -> Result<T, ShardError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|e| ShardError::WorkerFailed(e.to_string()))?
    }
}

#[async_trait]
impl<R: ShardingApi + 'static> AsyncShardingApi for AsyncShardRouter<R> {
    async fn create(&self, record: Record) -> Result<ShardIndex, ShardError> {
        self.blocking(move |r| r.create(record)).await
    }

    async fn read(&self, id: RecordId) -> Result<(Option<Record>, ShardIndex), ShardError> {
        self.blocking(move |r| r.read(id)).await
    }

    async fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> Result<(Record, ShardIndex), ShardError> {
        self.blocking(move |r| r.update(id, &update)).await
    }

    async fn delete(&self, id: RecordId) -> Result<bool, ShardError> {
        self.blocking(move |r| r.delete(id)).await
    }

    async fn list_all(&self) -> Result<ShardListing, ShardError> {
        self.blocking(|r| r.list_all()).await
    }

    async fn add_shard(&self, descriptor: ShardDescriptor) -> Result<RebalanceReport, ShardError> {
        self.blocking(move |r| r.add_shard(descriptor)).await
    }
}
