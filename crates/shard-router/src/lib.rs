//! # Shard Router
//!
//! Key-to-shard routing, per-shard CRUD and record migration on topology
//! growth.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Spread records across independent stores by primary key:
//! - Hash routing (Keccak-256 digest modulo shard count) or range routing
//!   (fixed inclusive upper bounds, last shard catch-all)
//! - Versioned, append-only topology; every request pins a snapshot
//! - Rebalancing after a shard is added, journaled step by step
//!
//! ## Failure Model
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Duplicate id on target shard | `DuplicateKey`, nothing written |
//! | Store unreachable | `ConnectionFailure`, no retry |
//! | New shard never becomes ready | `ProvisioningTimeout`, topology unchanged |
//! | One half of a move fails | `PartialRebalanceFailure`, run stops |
//!
//! With the default insert-first order a partial failure leaves a duplicate,
//! which the next `rebalance()` removes (the owner's copy wins).
//!
//! ## Module Structure
//!
//! ```text
//! shard-router/
//! ├── domain/          # Records, topology, errors, invariants
//! ├── algorithms/      # Routing, rebalance planning
//! ├── ports/           # API traits + dependency traits
//! ├── adapters/        # In-memory and SQLite shards, migration journals
//! └── service/         # Router, registry, rebalancer, async facade
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    InMemoryBackendFactory, InMemoryJournal, InMemoryShardBackend, JsonLinesJournal,
    SqliteBackendFactory, SqliteConfig, SqliteShardBackend, TracingJournal,
};
pub use algorithms::{
    find_misplaced, hash_route, is_cross_shard, key_digest, plan_rebalance, range_route, route,
    Migration, RebalancePlan,
};
pub use domain::{
    invariant_deterministic_routing, invariant_migrated_owned, invariant_range_monotonic,
    invariant_route_in_bounds, invariant_single_owner, AppliedHalf, FieldAssignment, JournalEntry,
    MigrationOrder, MigrationPhase, RangeTable, RebalanceReport, Record, RecordField, RecordId,
    RecordUpdate, RouterConfig, RoutingStrategy, ShardDescriptor, ShardError, ShardIndex,
    ShardListing, StepKind, Topology,
};
pub use ports::{
    AsyncShardingApi, BackendFactory, MigrationJournal, NoopProvisioner, ShardBackend,
    ShardProvisioner, ShardingApi,
};
pub use service::{AsyncShardRouter, Rebalancer, ShardRouter, ShardSet, TopologyRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
