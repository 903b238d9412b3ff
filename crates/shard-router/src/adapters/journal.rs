//! Migration journal adapters.

use crate::domain::{JournalEntry, MigrationPhase, RecordId, ShardError};
use crate::ports::outbound::MigrationJournal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Journal that only emits structured log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingJournal;

impl MigrationJournal for TracingJournal {
    fn record(&self, entry: &JournalEntry) -> Result<(), ShardError> {
        info!(
            run_id = %entry.run_id,
            topology_version = entry.topology_version,
            kind = ?entry.kind,
            record_id = entry.record_id,
            from = entry.from,
            to = entry.to,
            order = %entry.order,
            phase = %entry.phase,
            "migration step"
        );
        Ok(())
    }
}

/// Journal kept in memory, for tests.
#[derive(Default)]
pub struct InMemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
    failing: Mutex<bool>,
}

impl InMemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in write order.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

impl MigrationJournal for InMemoryJournal {
    fn record(&self, entry: &JournalEntry) -> Result<(), ShardError> {
        if *self.failing.lock() {
            return Err(ShardError::Journal("journal unavailable".to_string()));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Append-only JSON-lines file, one entry per line.
///
/// Each write is synced before returning, so an entry survives a crash of
/// the step it precedes.
pub struct JsonLinesJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesJournal {
    /// Journal writing to `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every journaled entry in file order. A missing file reads as empty.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, ShardError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ShardError::Journal(e.to_string())),
        };

        let mut entries = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| ShardError::Journal(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| {
                ShardError::Journal(format!("line {}: {}", line_no + 1, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Latest entry of every record whose last step never finished cleanly.
    ///
    /// Steps of one record run one after another, across runs too, so the
    /// record's last entry decides: `Completed` or `Skipped` means settled,
    /// `Planned`, `FirstHalfApplied` or `Failed` needs reconciliation. A
    /// failed step is cleared once a later run settles the same record.
    pub fn pending_migrations(&self) -> Result<Vec<JournalEntry>, ShardError> {
        let mut latest: HashMap<RecordId, usize> = HashMap::new();
        let mut steps: Vec<JournalEntry> = Vec::new();

        for entry in self.entries()? {
            match latest.get(&entry.record_id) {
                Some(&slot) => steps[slot] = entry,
                None => {
                    latest.insert(entry.record_id, steps.len());
                    steps.push(entry);
                }
            }
        }

        Ok(steps
            .into_iter()
            .filter(|e| !matches!(e.phase, MigrationPhase::Completed | MigrationPhase::Skipped))
            .collect())
    }
}

impl MigrationJournal for JsonLinesJournal {
    fn record(&self, entry: &JournalEntry) -> Result<(), ShardError> {
        let mut line =
            serde_json::to_string(entry).map_err(|e| ShardError::Journal(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ShardError::Journal(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ShardError::Journal(e.to_string()))?;
        file.sync_data()
            .map_err(|e| ShardError::Journal(e.to_string()))
    }
}
