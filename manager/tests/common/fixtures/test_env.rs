//! Fully wired backup environment over any `DataStore`

use backup_manager::catalog::BackupCatalog;
use backup_manager::restore::RestoreEngine;
use backup_manager::services::{BackupService, BackupSettings};
use backup_manager::snapshot::SnapshotWriter;
use backup_manager::store::DataStore;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::test_clock::TestClock;

pub struct TestEnv<S: DataStore + 'static> {
    pub dir: TempDir,
    pub store: Arc<S>,
    pub catalog: Arc<BackupCatalog>,
    pub clock: Arc<TestClock>,
}

impl<S: DataStore + 'static> TestEnv<S> {
    pub async fn new(store: S) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            store: Arc::new(store),
            catalog: Arc::new(BackupCatalog::open_in_memory().await.unwrap()),
            clock: Arc::new(TestClock::new()),
        }
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    pub fn writer(&self) -> Arc<SnapshotWriter<S>> {
        Arc::new(SnapshotWriter::new(
            self.store.clone(),
            self.catalog.clone(),
            self.clock.clone(),
            self.backup_dir(),
        ))
    }

    pub fn engine(&self) -> RestoreEngine<S> {
        RestoreEngine::new(self.store.clone(), self.catalog.clone(), self.writer())
    }

    pub fn service(&self) -> BackupService<S> {
        BackupService::new(
            self.store.clone(),
            self.catalog.clone(),
            self.clock.clone(),
            BackupSettings {
                backup_dir: self.backup_dir().to_string_lossy().to_string(),
                compress_by_default: false,
                verify_on_create: true,
                excluded_tables: Vec::new(),
            },
        )
    }

    /// File names currently in the backup directory
    pub fn backup_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.backup_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}
