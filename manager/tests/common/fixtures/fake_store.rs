//! In-memory `DataStore` that records every table access and can be told to fail

use backup_manager::errors::{BackupError, BackupResult};
use backup_manager::store::{DataStore, Row, Statement};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Read(String),
    Write(String),
    Count(String),
}

impl Access {
    pub fn table(&self) -> &str {
        match self {
            Access::Read(t) | Access::Write(t) | Access::Count(t) => t,
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    accesses: Mutex<Vec<Access>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    miscounted: Mutex<HashSet<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.lock().unwrap().insert(name.to_string(), rows);
        self
    }

    pub fn set_rows(&self, name: &str, rows: Vec<Row>) {
        self.tables.lock().unwrap().insert(name.to_string(), rows);
    }

    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_reads_of(&self, table: &str) {
        self.failing_reads.lock().unwrap().insert(table.to_string());
    }

    /// Transactions on `table` fail after their first statement and roll back
    pub fn fail_writes_to(&self, table: &str) {
        self.failing_writes.lock().unwrap().insert(table.to_string());
    }

    /// `count_rows` on `table` reports one row more than it holds
    pub fn miscount(&self, table: &str) {
        self.miscounted.lock().unwrap().insert(table.to_string());
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.accesses.lock().unwrap().clone()
    }

    pub fn clear_accesses(&self) {
        self.accesses.lock().unwrap().clear();
    }

    pub fn touched_tables(&self) -> BTreeSet<String> {
        self.accesses()
            .iter()
            .map(|a| a.table().to_string())
            .collect()
    }

    pub fn written_tables(&self) -> BTreeSet<String> {
        self.accesses()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn record(&self, access: Access) {
        self.accesses.lock().unwrap().push(access);
    }
}

impl DataStore for FakeStore {
    async fn list_tables(&self) -> BackupResult<BTreeSet<String>> {
        Ok(self.tables.lock().unwrap().keys().cloned().collect())
    }

    async fn read_rows(&self, table: &str) -> BackupResult<Vec<Row>> {
        self.record(Access::Read(table.to_string()));
        if self.failing_reads.lock().unwrap().contains(table) {
            return Err(BackupError::storage(format!("read of {} failed", table)));
        }
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| BackupError::storage(format!("no such table: {}", table)))
    }

    async fn execute_in_transaction(
        &self,
        table: &str,
        statements: &[Statement],
    ) -> BackupResult<u64> {
        self.record(Access::Write(table.to_string()));

        let mut tables = self.tables.lock().unwrap();
        let mut working = tables.get(table).cloned().ok_or_else(|| BackupError::Apply {
            table: table.to_string(),
            reason: "no such table".to_string(),
        })?;
        let fail = self.failing_writes.lock().unwrap().contains(table);
        let mut inserted = 0;

        for (index, statement) in statements.iter().enumerate() {
            if fail && index > 0 {
                // working copy is dropped; the table keeps its previous rows
                return Err(BackupError::Apply {
                    table: table.to_string(),
                    reason: format!("statement {}: injected failure", index),
                });
            }
            match statement {
                Statement::ClearTable => working.clear(),
                Statement::InsertRow(row) => {
                    working.push(row.clone());
                    inserted += 1;
                }
            }
        }

        tables.insert(table.to_string(), working);
        Ok(inserted)
    }

    async fn count_rows(&self, table: &str) -> BackupResult<u64> {
        self.record(Access::Count(table.to_string()));
        let actual = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0);
        let skew = u64::from(self.miscounted.lock().unwrap().contains(table));
        Ok(actual + skew)
    }
}
