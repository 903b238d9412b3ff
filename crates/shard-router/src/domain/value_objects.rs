//! # Domain Value Objects
//!
//! Immutable value types for routing and migration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order in which the two halves of a record move execute.
///
/// There is no shared transaction between shards, so the order decides the
/// failure mode: insert-first can leave a duplicate, delete-first can lose
/// the record until someone restores it from the journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOrder {
    /// Insert into the owner, then delete from the old shard.
    #[default]
    InsertThenDelete,
    /// Delete from the old shard, then insert into the owner.
    DeleteThenInsert,
}

impl MigrationOrder {
    /// Half that runs first under this order.
    pub fn first_half(&self) -> AppliedHalf {
        match self {
            Self::InsertThenDelete => AppliedHalf::InsertedIntoTarget,
            Self::DeleteThenInsert => AppliedHalf::DeletedFromSource,
        }
    }
}

impl fmt::Display for MigrationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertThenDelete => write!(f, "insert-then-delete"),
            Self::DeleteThenInsert => write!(f, "delete-then-insert"),
        }
    }
}

impl std::str::FromStr for MigrationOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert-then-delete" | "insert-first" => Ok(Self::InsertThenDelete),
            "delete-then-insert" | "delete-first" => Ok(Self::DeleteThenInsert),
            other => Err(format!("unknown migration order: {}", other)),
        }
    }
}

/// One half of a record move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedHalf {
    /// Record was removed from its old shard.
    DeletedFromSource,
    /// Record was written to its new shard.
    InsertedIntoTarget,
}

impl fmt::Display for AppliedHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeletedFromSource => write!(f, "deleted from source"),
            Self::InsertedIntoTarget => write!(f, "inserted into target"),
        }
    }
}

/// Journal phase of a single migration step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// Step is about to execute; nothing has changed yet.
    Planned,
    /// First half done, second half pending.
    FirstHalfApplied,
    /// Both halves done.
    Completed,
    /// Source copy vanished before the step ran (concurrent delete).
    Skipped,
    /// Step failed; see the error for which half completed.
    Failed,
}

impl MigrationPhase {
    /// Check if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::FirstHalfApplied => write!(f, "first_half_applied"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of migration step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Record moves from a non-owner shard to its owner.
    Move,
    /// Stale duplicate copy removed from a non-owner shard.
    Discard,
}

/// Updatable record column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    /// `name` column.
    Name,
    /// `email` column.
    Email,
}

impl RecordField {
    /// Column name in the shard table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
        }
    }
}

/// A single `(field, value)` assignment. `None` clears the column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssignment {
    /// Target column.
    pub field: RecordField,
    /// New value.
    pub value: Option<String>,
}

/// Sparse update descriptor: only the listed fields change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    assignments: Vec<FieldAssignment>,
}

impl RecordUpdate {
    /// Empty update (no-op).
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a field; a later assignment of the same field replaces it.
    pub fn set(mut self, field: RecordField, value: Option<String>) -> Self {
        match self.assignments.iter_mut().find(|a| a.field == field) {
            Some(existing) => existing.value = value,
            None => self.assignments.push(FieldAssignment { field, value }),
        }
        self
    }

    /// Set `name`.
    pub fn name(self, name: impl Into<String>) -> Self {
        self.set(RecordField::Name, Some(name.into()))
    }

    /// Set `email`.
    pub fn email(self, email: impl Into<String>) -> Self {
        self.set(RecordField::Email, Some(email.into()))
    }

    /// Clear a column to NULL.
    pub fn clear(self, field: RecordField) -> Self {
        self.set(field, None)
    }

    /// Build from optional inputs, skipping the absent ones.
    pub fn from_options(name: Option<String>, email: Option<String>) -> Self {
        let mut update = Self::new();
        if let Some(name) = name {
            update = update.name(name);
        }
        if let Some(email) = email {
            update = update.email(email);
        }
        update
    }

    /// True when no field is assigned.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assigned fields in insertion order.
    pub fn assignments(&self) -> &[FieldAssignment] {
        &self.assignments
    }
}
