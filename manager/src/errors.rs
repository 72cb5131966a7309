//! Custom error types for the backup engine
//!
//! Every component returns a [`BackupError`]. Capture and corruption failures
//! stop the whole operation; apply and manifest-mismatch failures are scoped to
//! one table and collected into a restore result instead of being propagated.

use serde::Serialize;
use std::fmt;

/// Result alias used by every engine component
pub type BackupResult<T> = Result<T, BackupError>;

/// Main error type for the backup engine
#[derive(Debug)]
pub enum BackupError {
    /// A table could not be read while writing a snapshot
    Capture { table: String, reason: String },

    /// The snapshot file is structurally invalid
    Corruption(CorruptionError),

    /// A row statement failed to apply during restore
    Apply { table: String, reason: String },

    /// Post-restore row count disagrees with the snapshot manifest
    ManifestMismatch {
        table: String,
        expected: u64,
        actual: u64,
    },

    /// Unknown backup id or table name
    NotFound(NotFoundError),

    /// The backup is in use by another operation
    Busy { backup_id: String, operation: String },

    /// The request itself cannot be served
    InvalidRequest { reason: String },

    /// Catalog or data-store failure outside of capture/apply
    Storage { reason: String },

    /// Filesystem failure on a snapshot file
    Io { path: String, reason: String },
}

/// Structural defect found while parsing a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionError {
    /// Segment being parsed when the defect was found, if any
    pub table: Option<String>,
    /// 1-based line number within the decompressed stream
    pub line: u64,
    /// Byte offset of the offending line within the decompressed stream
    pub offset: u64,
    pub reason: String,
}

/// Not-found error variants
#[derive(Debug)]
pub enum NotFoundError {
    /// No catalog entry with this id
    Backup { id: String },

    /// Table absent from the live store or from a backup manifest
    Table {
        table: String,
        backup_id: Option<String>,
    },
}

impl BackupError {
    pub fn backup_not_found(id: &str) -> Self {
        BackupError::NotFound(NotFoundError::Backup { id: id.to_string() })
    }

    pub fn table_not_found(table: &str, backup_id: Option<&str>) -> Self {
        BackupError::NotFound(NotFoundError::Table {
            table: table.to_string(),
            backup_id: backup_id.map(str::to_string),
        })
    }

    pub fn io(path: impl fmt::Display, err: impl fmt::Display) -> Self {
        BackupError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        BackupError::Storage {
            reason: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackupError::NotFound(_))
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Capture { table, reason } => {
                write!(f, "Failed to capture table '{}': {}", table, reason)
            }
            BackupError::Corruption(e) => write!(f, "Snapshot corrupted: {}", e),
            BackupError::Apply { table, reason } => {
                write!(f, "Failed to apply rows to table '{}': {}", table, reason)
            }
            BackupError::ManifestMismatch {
                table,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Row count mismatch for table '{}': manifest has {}, table has {}",
                    table, expected, actual
                )
            }
            BackupError::NotFound(e) => write!(f, "{}", e),
            BackupError::Busy {
                backup_id,
                operation,
            } => {
                write!(f, "Backup {} is busy with: {}", backup_id, operation)
            }
            BackupError::InvalidRequest { reason } => write!(f, "Invalid request: {}", reason),
            BackupError::Storage { reason } => write!(f, "Storage error: {}", reason),
            BackupError::Io { path, reason } => write!(f, "I/O error on '{}': {}", path, reason),
        }
    }
}

impl fmt::Display for CorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(
                f,
                "{} (table '{}', line {}, offset {})",
                self.reason, table, self.line, self.offset
            ),
            None => write!(
                f,
                "{} (line {}, offset {})",
                self.reason, self.line, self.offset
            ),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundError::Backup { id } => write!(f, "Backup '{}' not found", id),
            NotFoundError::Table {
                table,
                backup_id: Some(backup_id),
            } => {
                write!(f, "Table '{}' not found in backup '{}'", table, backup_id)
            }
            NotFoundError::Table {
                table,
                backup_id: None,
            } => {
                write!(f, "Table '{}' not found", table)
            }
        }
    }
}

impl std::error::Error for BackupError {}
impl std::error::Error for CorruptionError {}
impl std::error::Error for NotFoundError {}

// Conversions from anyhow::Error for wiring code that still uses anyhow
impl From<anyhow::Error> for BackupError {
    fn from(err: anyhow::Error) -> Self {
        BackupError::Storage {
            reason: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for BackupError {
    fn from(err: sqlx::Error) -> Self {
        BackupError::Storage {
            reason: err.to_string(),
        }
    }
}

impl From<CorruptionError> for BackupError {
    fn from(err: CorruptionError) -> Self {
        BackupError::Corruption(err)
    }
}

impl From<NotFoundError> for BackupError {
    fn from(err: NotFoundError) -> Self {
        BackupError::NotFound(err)
    }
}
