//! # Outbound Ports
//!
//! Traits for external dependencies: per-shard stores, the provisioning
//! collaborator and the migration journal.

use crate::domain::{
    JournalEntry, Record, RecordId, RecordUpdate, ShardDescriptor, ShardError,
};
use std::sync::Arc;

/// CRUD against one shard's backing store.
///
/// Every call blocks. Implementations acquire whatever connection they need
/// per call and release it on every exit path.
pub trait ShardBackend: Send + Sync {
    /// Descriptor name of the shard (used in errors and logs).
    fn name(&self) -> &str;

    /// Create the record table if absent. Idempotent.
    fn ensure_schema(&self) -> Result<(), ShardError>;

    /// Insert a record; `DuplicateKey` if the id already exists here.
    fn insert(&self, record: &Record) -> Result<(), ShardError>;

    /// Fetch a record by id.
    fn get(&self, id: RecordId) -> Result<Option<Record>, ShardError>;

    /// Apply a sparse update and return the resulting record.
    ///
    /// An empty update returns the record unchanged. `NotFound` if absent.
    fn update(&self, id: RecordId, update: &RecordUpdate) -> Result<Record, ShardError>;

    /// Delete by id; `false` when nothing was removed.
    fn delete(&self, id: RecordId) -> Result<bool, ShardError>;

    /// Every record on the shard, ordered by id.
    fn list_all(&self) -> Result<Vec<Record>, ShardError>;

    /// Readiness probe used while provisioning.
    fn ping(&self) -> Result<(), ShardError> {
        self.ensure_schema()
    }
}

/// Opens backend handles for descriptors.
pub trait BackendFactory: Send + Sync {
    /// Create a handle for the shard a descriptor names.
    ///
    /// Must not require the store to be reachable yet; readiness is probed
    /// separately.
    fn open(&self, descriptor: &ShardDescriptor) -> Result<Arc<dyn ShardBackend>, ShardError>;
}

/// Orchestration collaborator that makes a shard's store exist.
pub trait ShardProvisioner: Send + Sync {
    /// Start (or create) the store for `descriptor`.
    ///
    /// Returning `Ok` does not imply readiness; the router polls afterwards.
    fn provision(&self, descriptor: &ShardDescriptor) -> Result<(), ShardError>;
}

/// Append-only record of migration steps.
///
/// Entries are written before the step they describe executes, so a crash
/// mid-run leaves a `Planned` or `FirstHalfApplied` entry behind.
pub trait MigrationJournal: Send + Sync {
    /// Persist one entry.
    fn record(&self, entry: &JournalEntry) -> Result<(), ShardError>;
}

/// Provisioner for stores that need no external process.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProvisioner;

impl ShardProvisioner for NoopProvisioner {
    fn provision(&self, _descriptor: &ShardDescriptor) -> Result<(), ShardError> {
        Ok(())
    }
}
