//! # Adapters Module
//!
//! Concrete implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `memory`: in-memory shards with fault injection
//! - `sqlite`: one SQLite file per shard
//! - `journal`: migration journal sinks

pub mod journal;
pub mod memory;
pub mod sqlite;

pub use journal::{InMemoryJournal, JsonLinesJournal, TracingJournal};
pub use memory::{InMemoryBackendFactory, InMemoryShardBackend};
pub use sqlite::{SqliteBackendFactory, SqliteConfig, SqliteShardBackend};
