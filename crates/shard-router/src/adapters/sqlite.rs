//! SQLite shard backend.
//!
//! One file per shard, one short-lived connection per operation. The schema
//! is ensured on every connection acquisition, so a freshly provisioned file
//! needs no separate migration step.

use crate::domain::{Record, RecordId, RecordUpdate, ShardDescriptor, ShardError};
use crate::ports::outbound::{BackendFactory, ShardBackend};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    name TEXT,
    email TEXT
)";

const SELECT_ONE: &str = "SELECT id, name, email FROM records WHERE id = ?1";

/// SQLite connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// How long a connection waits on a locked database (ms).
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

impl SqliteConfig {
    /// Create config for testing.
    pub fn for_testing() -> Self {
        Self {
            busy_timeout_ms: 500,
        }
    }
}

/// Shard stored in a single SQLite file.
pub struct SqliteShardBackend {
    name: String,
    path: PathBuf,
    config: SqliteConfig,
}

impl SqliteShardBackend {
    /// Create a handle; nothing is opened until the first operation.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, config: SqliteConfig) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            config,
        }
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection with the schema in place.
    fn connect(&self) -> Result<Connection, ShardError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.connection_failure(e))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|e| self.connection_failure(e))?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(|e| self.connection_failure(e))?;
        conn.execute_batch(CREATE_TABLE)
            .map_err(|e| self.storage(e))?;

        trace!(shard = %self.name, path = %self.path.display(), "opened shard connection");
        Ok(conn)
    }

    fn connection_failure(&self, err: impl ToString) -> ShardError {
        ShardError::ConnectionFailure {
            shard: self.name.clone(),
            reason: err.to_string(),
        }
    }

    fn storage(&self, err: rusqlite::Error) -> ShardError {
        ShardError::Storage {
            shard: self.name.clone(),
            reason: err.to_string(),
        }
    }

    fn not_found(&self, id: RecordId) -> ShardError {
        ShardError::NotFound {
            id,
            shard: self.name.clone(),
        }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl ShardBackend for SqliteShardBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_schema(&self) -> Result<(), ShardError> {
        self.connect().map(|_| ())
    }

    fn insert(&self, record: &Record) -> Result<(), ShardError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO records (id, name, email) VALUES (?1, ?2, ?3)",
            params![record.id, record.name, record.email],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ShardError::DuplicateKey {
                    id: record.id,
                    shard: self.name.clone(),
                }
            } else {
                self.storage(e)
            }
        })?;
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, ShardError> {
        let conn = self.connect()?;
        conn.query_row(SELECT_ONE, params![id], row_to_record)
            .optional()
            .map_err(|e| self.storage(e))
    }

    fn update(&self, id: RecordId, update: &RecordUpdate) -> Result<Record, ShardError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(|e| self.storage(e))?;

        let current = tx
            .query_row(SELECT_ONE, params![id], row_to_record)
            .optional()
            .map_err(|e| self.storage(e))?
            .ok_or_else(|| self.not_found(id))?;

        if update.is_empty() {
            return Ok(current);
        }

        let set_clause = update
            .assignments()
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{} = ?{}", a.field.column(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE records SET {} WHERE id = ?{}",
            set_clause,
            update.assignments().len() + 1
        );

        let mut values: Vec<&dyn ToSql> = update
            .assignments()
            .iter()
            .map(|a| &a.value as &dyn ToSql)
            .collect();
        values.push(&id);

        tx.execute(&sql, values.as_slice())
            .map_err(|e| self.storage(e))?;
        tx.commit().map_err(|e| self.storage(e))?;

        let mut updated = current;
        updated.apply(update);
        Ok(updated)
    }

    fn delete(&self, id: RecordId) -> Result<bool, ShardError> {
        let conn = self.connect()?;
        let removed = conn
            .execute("DELETE FROM records WHERE id = ?1", params![id])
            .map_err(|e| self.storage(e))?;
        Ok(removed > 0)
    }

    fn list_all(&self) -> Result<Vec<Record>, ShardError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT id, name, email FROM records ORDER BY id")
            .map_err(|e| self.storage(e))?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(|e| self.storage(e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.storage(e))
    }
}

/// Opens SQLite shards beneath a data directory.
///
/// Absolute locations are used as-is; relative ones are joined onto the data
/// directory.
pub struct SqliteBackendFactory {
    data_dir: PathBuf,
    config: SqliteConfig,
}

impl SqliteBackendFactory {
    /// Create a factory rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, config: SqliteConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
        }
    }

    /// Conventional file name for the shard at `index`.
    pub fn shard_file_name(index: usize) -> String {
        format!("shard_{}.db", index)
    }

    /// Path a location resolves to.
    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

impl BackendFactory for SqliteBackendFactory {
    fn open(&self, descriptor: &ShardDescriptor) -> Result<Arc<dyn ShardBackend>, ShardError> {
        Ok(Arc::new(SqliteShardBackend::new(
            descriptor.name.clone(),
            self.resolve(&descriptor.location),
            self.config.clone(),
        )))
    }
}
