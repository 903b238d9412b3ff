//! # Domain Errors
//!
//! Error types for shard routing and resharding.

use super::value_objects::AppliedHalf;
use thiserror::Error;

/// Position of a shard in the topology (0-based).
pub type ShardIndex = usize;

/// Record primary key; also the partition key.
pub type RecordId = i64;

/// Sharding error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// Insert of an id already present on the target shard.
    #[error("Duplicate key {id} on shard {shard}")]
    DuplicateKey {
        /// Offending record id
        id: RecordId,
        /// Shard name
        shard: String,
    },

    /// Update against an absent id.
    #[error("Record {id} not found on shard {shard}")]
    NotFound {
        /// Missing record id
        id: RecordId,
        /// Shard name
        shard: String,
    },

    /// Shard store unreachable.
    #[error("Connection to shard {shard} failed: {reason}")]
    ConnectionFailure {
        /// Shard name
        shard: String,
        /// Underlying failure
        reason: String,
    },

    /// Shard did not become reachable in time.
    #[error("Shard {shard} not ready after {waited_ms}ms")]
    ProvisioningTimeout {
        /// Shard name
        shard: String,
        /// Time spent polling
        waited_ms: u64,
    },

    /// One half of a record move completed, the other did not.
    ///
    /// There is no compensating transaction: the record needs manual
    /// reconciliation (or a later `rebalance()` when the target holds a copy).
    #[error(
        "Partial rebalance failure for record {record_id}: shard {from} -> {to}, \
         completed {applied}, failed: {reason}"
    )]
    PartialRebalanceFailure {
        /// Record being moved
        record_id: RecordId,
        /// Source shard index
        from: ShardIndex,
        /// Target shard index
        to: ShardIndex,
        /// The half that did complete
        applied: AppliedHalf,
        /// Failure of the other half
        reason: String,
    },

    /// The first half of a migration step failed; the record was not touched.
    #[error("Rebalance aborted at record {record_id} (shard {from} -> {to}): {reason}")]
    RebalanceAborted {
        /// Record being migrated
        record_id: RecordId,
        /// Source shard index
        from: ShardIndex,
        /// Target shard index
        to: ShardIndex,
        /// Underlying failure
        reason: String,
    },

    /// Shard placement contradicts the routing invariant.
    #[error("Shard state inconsistency: {0}")]
    StateInconsistency(String),

    /// Shard index outside the topology.
    #[error("Unknown shard: {0}")]
    UnknownShard(ShardIndex),

    /// New descriptor collides with a registered shard.
    #[error("Shard descriptor collides with existing shard (name={name}, location={location})")]
    DescriptorCollision {
        /// Requested name
        name: String,
        /// Requested location
        location: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other store failure.
    #[error("Storage error on shard {shard}: {reason}")]
    Storage {
        /// Shard name
        shard: String,
        /// Underlying failure
        reason: String,
    },

    /// Migration journal write failed.
    #[error("Migration journal error: {0}")]
    Journal(String),

    /// Blocking worker task failed.
    #[error("Worker task failed: {0}")]
    WorkerFailed(String),
}

impl ShardError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only connectivity problems qualify; the router itself never retries
    /// steady-state CRUD.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailure { .. })
    }

    /// Whether the error leaves shard data needing manual reconciliation.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(
            self,
            Self::PartialRebalanceFailure { .. } | Self::StateInconsistency(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_error() {
        let err = ShardError::DuplicateKey {
            id: 101,
            shard: "shard1".to_string(),
        };
        assert!(err.to_string().contains("101"));
        assert!(err.to_string().contains("shard1"));
    }

    #[test]
    fn test_partial_rebalance_failure_error() {
        let err = ShardError::PartialRebalanceFailure {
            record_id: 42,
            from: 1,
            to: 3,
            applied: AppliedHalf::DeletedFromSource,
            reason: "disk full".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("1 -> 3"));
        assert!(msg.contains("deleted from source"));
        assert!(err.requires_reconciliation());
    }

    #[test]
    fn test_provisioning_timeout_error() {
        let err = ShardError::ProvisioningTimeout {
            shard: "shard5".to_string(),
            waited_ms: 30_000,
        };
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn test_only_connection_failure_is_retryable() {
        let conn = ShardError::ConnectionFailure {
            shard: "s".to_string(),
            reason: "refused".to_string(),
        };
        assert!(conn.is_retryable());
        assert!(!ShardError::UnknownShard(7).is_retryable());
        assert!(!ShardError::NotFound {
            id: 1,
            shard: "s".to_string()
        }
        .is_retryable());
    }
}
