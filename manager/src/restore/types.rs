//! Restore request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::TableEntry;
use crate::constants::restore::{DEFAULT_VERIFY_AFTER, DEFAULT_VERIFY_BEFORE};

/// Caller-tunable restore behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Subset of tables to restore; `None` restores the whole manifest
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default = "default_verify_before")]
    pub verify_before: bool,
    #[serde(default = "default_verify_after")]
    pub verify_after: bool,
    #[serde(default)]
    pub create_safety_backup: bool,
}

fn default_verify_before() -> bool {
    DEFAULT_VERIFY_BEFORE
}

fn default_verify_after() -> bool {
    DEFAULT_VERIFY_AFTER
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            tables: None,
            verify_before: DEFAULT_VERIFY_BEFORE,
            verify_after: DEFAULT_VERIFY_AFTER,
            create_safety_backup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub backup_id: String,
    #[serde(flatten)]
    pub options: RestoreOptions,
}

impl RestoreRequest {
    pub fn new(backup_id: impl Into<String>, options: RestoreOptions) -> Self {
        Self {
            backup_id: backup_id.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePhase {
    Requested,
    Verifying,
    SafetyBackupInProgress,
    Applying,
    Completed,
    Failed,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestorePhase::Requested => "requested",
            RestorePhase::Verifying => "verifying",
            RestorePhase::SafetyBackupInProgress => "safety_backup_in_progress",
            RestorePhase::Applying => "applying",
            RestorePhase::Completed => "completed",
            RestorePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorKind {
    Apply,
    ManifestMismatch,
}

/// Failure scoped to one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableError {
    pub table: String,
    pub kind: TableErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    pub backup_id: String,
    pub success: bool,
    pub phase: RestorePhase,
    pub restored_tables: Vec<TableEntry>,
    pub errors: Vec<TableError>,
    pub safety_backup_id: Option<String>,
}

impl RestoreResult {
    pub fn restored(&self, table: &str) -> bool {
        self.restored_tables.iter().any(|entry| entry.name == table)
    }

    pub fn error_for(&self, table: &str) -> Option<&TableError> {
        self.errors.iter().find(|e| e.table == table)
    }
}
