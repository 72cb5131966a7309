//! Catalog record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of the last integrity verification of a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unknown,
    Passed,
    Failed,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unknown => "unknown",
            VerificationStatus::Passed => "passed",
            VerificationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(VerificationStatus::Unknown),
            "passed" => Ok(VerificationStatus::Passed),
            "failed" => Ok(VerificationStatus::Failed),
            other => Err(format!("unknown verification status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub row_count: u64,
}

/// Tables captured by a snapshot, in segment order, with their row counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableManifest {
    tables: Vec<TableEntry>,
}

impl TableManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, row_count: u64) {
        self.tables.push(TableEntry {
            name: name.into(),
            row_count,
        });
    }

    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|entry| entry.name == table)
            .map(|entry| entry.row_count)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.row_count(table).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|entry| entry.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|entry| entry.row_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
    pub compressed: bool,
    pub table_manifest: TableManifest,
    pub verified: VerificationStatus,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_backups: usize,
    pub total_size_bytes: u64,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
    pub verified_passed: usize,
    pub verified_failed: usize,
    pub verified_unknown: usize,
}
