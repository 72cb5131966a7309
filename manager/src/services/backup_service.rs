use glob::{glob, Pattern};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{BackupCatalog, BackupRecord, CatalogStats, TableManifest};
use crate::clock::BackupClock;
use crate::constants::{operations, snapshot::TEMP_SUFFIX};
use crate::errors::{BackupError, BackupResult};
use crate::operation_tracker::{OperationStatus, OperationTracker};
use crate::restore::{RestoreEngine, RestoreOptions, RestoreResult};
use crate::snapshot::{BackupOptions, SnapshotWriter};
use crate::store::DataStore;
use crate::verifier::{IntegrityVerifier, VerificationReport};

/// Operator request to create a backup; unset flags fall back to settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBackupRequest {
    pub description: String,
    #[serde(default)]
    pub compress: Option<bool>,
    #[serde(default)]
    pub verify: Option<bool>,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_dir: String,
    pub compress_by_default: bool,
    pub verify_on_create: bool,
    pub excluded_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub retention_count: usize,
    pub deleted: Vec<String>,
    pub skipped_busy: Vec<String>,
}

pub struct BackupService<S: DataStore> {
    settings: BackupSettings,
    catalog: Arc<BackupCatalog>,
    writer: Arc<SnapshotWriter<S>>,
    verifier: IntegrityVerifier,
    restore_engine: RestoreEngine<S>,
    operation_tracker: OperationTracker,
}

impl<S: DataStore + 'static> BackupService<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Arc<BackupCatalog>,
        clock: Arc<dyn BackupClock>,
        settings: BackupSettings,
    ) -> Self {
        let writer = Arc::new(
            SnapshotWriter::new(store.clone(), catalog.clone(), clock, settings.backup_dir.clone())
                .with_excluded_tables(settings.excluded_tables.iter().cloned()),
        );

        Self {
            verifier: IntegrityVerifier::new(catalog.clone()),
            restore_engine: RestoreEngine::new(store, catalog.clone(), writer.clone()),
            operation_tracker: OperationTracker::new(),
            settings,
            catalog,
            writer,
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub fn operation_tracker(&self) -> &OperationTracker {
        &self.operation_tracker
    }

    pub async fn create_backup(&self, request: CreateBackupRequest) -> BackupResult<BackupRecord> {
        let description = request.description.trim();
        if description.is_empty() {
            return Err(BackupError::InvalidRequest {
                reason: "description must not be empty".to_string(),
            });
        }

        let options = BackupOptions {
            description: description.to_string(),
            compress: request.compress.unwrap_or(self.settings.compress_by_default),
            verify: request.verify.unwrap_or(self.settings.verify_on_create),
            tables: request.tables,
        };

        self.writer.write(&options).await
    }

    pub async fn list_backups(&self) -> BackupResult<Vec<BackupRecord>> {
        self.catalog.list().await
    }

    pub async fn get_backup_info(&self, backup_id: &str) -> BackupResult<BackupRecord> {
        self.catalog.get(backup_id).await
    }

    pub async fn get_recovery_options(&self, backup_id: &str) -> BackupResult<TableManifest> {
        self.restore_engine.get_recovery_options(backup_id).await
    }

    pub async fn test_restore(&self, backup_id: &str) -> BackupResult<VerificationReport> {
        info!("Test restore requested for backup {}", backup_id);
        self.restore_engine.test_restore(backup_id).await
    }

    pub async fn verify_backup(&self, backup_id: &str) -> BackupResult<VerificationReport> {
        self.verifier.verify(backup_id).await
    }

    pub async fn restore(&self, backup_id: &str, options: RestoreOptions) -> BackupResult<RestoreResult> {
        self.operation_tracker
            .try_start_operation(backup_id, operations::RESTORE)
            .await?;

        let result = self
            .restore_engine
            .restore_from_backup(backup_id, options)
            .await;

        self.operation_tracker.finish_operation(backup_id).await;
        result
    }

    pub async fn restore_specific_tables(
        &self,
        backup_id: &str,
        tables: &[String],
    ) -> BackupResult<RestoreResult> {
        self.operation_tracker
            .try_start_operation(backup_id, operations::RESTORE)
            .await?;

        let result = self
            .restore_engine
            .restore_specific_tables(backup_id, tables)
            .await;

        self.operation_tracker.finish_operation(backup_id).await;
        result
    }

    pub async fn delete_backup(&self, backup_id: &str) -> BackupResult<()> {
        self.operation_tracker
            .try_start_operation(backup_id, operations::DELETE)
            .await?;

        info!("Deleting backup {}", backup_id);
        let result = self.catalog.remove(backup_id).await;

        self.operation_tracker.finish_operation(backup_id).await;
        result
    }

    /// Keeps the `retention_count` most recent backups and removes the rest
    pub async fn cleanup_old_backups(&self, retention_count: usize) -> BackupResult<CleanupReport> {
        if retention_count == 0 {
            return Err(BackupError::InvalidRequest {
                reason: "retention count must be at least 1".to_string(),
            });
        }

        let backups = self.catalog.list().await?;
        let mut report = CleanupReport {
            retention_count,
            deleted: Vec::new(),
            skipped_busy: Vec::new(),
        };

        if backups.len() <= retention_count {
            info!(
                "No old backups to clean up (have {}, keeping {})",
                backups.len(),
                retention_count
            );
            return Ok(report);
        }

        for backup in &backups[retention_count..] {
            match self.delete_backup(&backup.id).await {
                Ok(()) => report.deleted.push(backup.id.clone()),
                Err(BackupError::Busy { .. }) => {
                    warn!("Backup {} is busy, keeping it for now", backup.id);
                    report.skipped_busy.push(backup.id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Cleaned up {} old backups (keeping {} most recent)",
            report.deleted.len(),
            retention_count
        );
        Ok(report)
    }

    /// Removes `*.tmp` files left in the backup directory by an interrupted write
    pub fn cleanup_stale_temp_files(&self) -> BackupResult<usize> {
        let pattern = format!(
            "{}/*{}",
            Pattern::escape(&self.settings.backup_dir),
            TEMP_SUFFIX
        );
        let mut removed = 0;

        for entry in glob(&pattern).map_err(|e| BackupError::storage(format!("glob pattern error: {}", e)))? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Unreadable backup directory entry: {}", e);
                    continue;
                }
            };
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    warn!("Removed stale temp snapshot {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Could not remove stale temp snapshot {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    pub async fn stats(&self) -> BackupResult<CatalogStats> {
        self.catalog.stats().await
    }

    pub async fn operation_status(&self) -> OperationStatus {
        self.operation_tracker.get_operation_status().await
    }
}
