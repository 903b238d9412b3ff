//! In-memory shard backend for tests and demos.
//!
//! Supports fault injection so partial-rebalance paths can be exercised
//! without a real store.

use crate::domain::{Record, RecordId, RecordUpdate, ShardDescriptor, ShardError};
use crate::ports::outbound::{BackendFactory, ShardBackend};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Faults {
    unreachable: bool,
    inserts_left: Option<usize>,
    deletes_left: Option<usize>,
}

impl Faults {
    /// Consume one unit of budget; `false` once exhausted.
    fn take(budget: &mut Option<usize>) -> bool {
        match budget {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// One shard held in a `BTreeMap`.
pub struct InMemoryShardBackend {
    name: String,
    records: RwLock<BTreeMap<RecordId, Record>>,
    faults: Mutex<Faults>,
}

impl InMemoryShardBackend {
    /// Create an empty shard.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Make every call fail with `ConnectionFailure` until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.lock().unreachable = unreachable;
    }

    /// Let `n` more inserts succeed, then fail the rest.
    pub fn fail_inserts_after(&self, n: usize) {
        self.faults.lock().inserts_left = Some(n);
    }

    /// Let `n` more deletes succeed, then fail the rest.
    pub fn fail_deletes_after(&self, n: usize) {
        self.faults.lock().deletes_left = Some(n);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Write a record directly, bypassing routing and faults.
    ///
    /// Used to stage misplaced or duplicated copies.
    pub fn seed(&self, record: Record) {
        self.records.write().insert(record.id, record);
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when the shard holds nothing.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_reachable(&self) -> Result<(), ShardError> {
        if self.faults.lock().unreachable {
            return Err(ShardError::ConnectionFailure {
                shard: self.name.clone(),
                reason: "shard unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn injected(&self, op: &str) -> ShardError {
        ShardError::Storage {
            shard: self.name.clone(),
            reason: format!("injected {} failure", op),
        }
    }
}

impl ShardBackend for InMemoryShardBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_schema(&self) -> Result<(), ShardError> {
        self.check_reachable()
    }

    fn insert(&self, record: &Record) -> Result<(), ShardError> {
        self.check_reachable()?;
        if !Faults::take(&mut self.faults.lock().inserts_left) {
            return Err(self.injected("insert"));
        }

        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(ShardError::DuplicateKey {
                id: record.id,
                shard: self.name.clone(),
            });
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, ShardError> {
        self.check_reachable()?;
        Ok(self.records.read().get(&id).cloned())
    }

    fn update(&self, id: RecordId, update: &RecordUpdate) -> Result<Record, ShardError> {
        self.check_reachable()?;
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or_else(|| ShardError::NotFound {
            id,
            shard: self.name.clone(),
        })?;
        record.apply(update);
        Ok(record.clone())
    }

    fn delete(&self, id: RecordId) -> Result<bool, ShardError> {
        self.check_reachable()?;
        if !Faults::take(&mut self.faults.lock().deletes_left) {
            return Err(self.injected("delete"));
        }
        Ok(self.records.write().remove(&id).is_some())
    }

    fn list_all(&self) -> Result<Vec<Record>, ShardError> {
        self.check_reachable()?;
        Ok(self.records.read().values().cloned().collect())
    }
}

/// Factory handing out one in-memory backend per location.
///
/// Re-opening a location returns the same backend, so tests can keep a
/// handle and inject faults into a shard the router owns.
#[derive(Default)]
pub struct InMemoryBackendFactory {
    backends: Mutex<HashMap<String, Arc<InMemoryShardBackend>>>,
}

impl InMemoryBackendFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend for a location, if it was opened.
    pub fn backend(&self, location: &str) -> Option<Arc<InMemoryShardBackend>> {
        self.backends.lock().get(location).cloned()
    }
}

impl BackendFactory for InMemoryBackendFactory {
    fn open(&self, descriptor: &ShardDescriptor) -> Result<Arc<dyn ShardBackend>, ShardError> {
        let backend = self
            .backends
            .lock()
            .entry(descriptor.location.clone())
            .or_insert_with(|| Arc::new(InMemoryShardBackend::new(descriptor.name.clone())))
            .clone();
        Ok(backend)
    }
}
