use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::types::{
    RestoreOptions, RestorePhase, RestoreRequest, RestoreResult, TableError, TableErrorKind,
};
use crate::catalog::{BackupCatalog, BackupRecord, TableEntry, TableManifest, VerificationStatus};
use crate::errors::{BackupError, BackupResult, CorruptionError};
use crate::snapshot::reader::read_segments;
use crate::snapshot::{BackupOptions, RowStatement, SnapshotWriter};
use crate::store::{DataStore, Statement};
use crate::verifier::{IntegrityVerifier, VerificationReport};

pub struct RestoreEngine<S: DataStore> {
    store: Arc<S>,
    catalog: Arc<BackupCatalog>,
    verifier: IntegrityVerifier,
    writer: Arc<SnapshotWriter<S>>,
}

impl<S: DataStore + 'static> RestoreEngine<S> {
    pub fn new(store: Arc<S>, catalog: Arc<BackupCatalog>, writer: Arc<SnapshotWriter<S>>) -> Self {
        Self {
            verifier: IntegrityVerifier::new(catalog.clone()),
            store,
            catalog,
            writer,
        }
    }

    pub async fn restore_from_backup(
        &self,
        backup_id: &str,
        options: RestoreOptions,
    ) -> BackupResult<RestoreResult> {
        self.restore(RestoreRequest::new(backup_id, options)).await
    }

    /// Restores only `tables`; every other table is neither read nor written
    pub async fn restore_specific_tables(
        &self,
        backup_id: &str,
        tables: &[String],
    ) -> BackupResult<RestoreResult> {
        let options = RestoreOptions {
            tables: Some(tables.to_vec()),
            ..RestoreOptions::default()
        };
        self.restore(RestoreRequest::new(backup_id, options)).await
    }

    /// Tables a restore from `backup_id` may contain. Catalog only.
    pub async fn get_recovery_options(&self, backup_id: &str) -> BackupResult<TableManifest> {
        Ok(self.catalog.get(backup_id).await?.table_manifest)
    }

    /// Verification without any apply phase
    pub async fn test_restore(&self, backup_id: &str) -> BackupResult<VerificationReport> {
        self.verifier.verify(backup_id).await
    }

    #[instrument(skip(self, request), fields(backup_id = %request.backup_id))]
    pub async fn restore(&self, request: RestoreRequest) -> BackupResult<RestoreResult> {
        let mut phase = RestorePhase::Requested;
        let record = self.catalog.get(&request.backup_id).await?;
        let targets = resolve_targets(&record, request.options.tables.as_deref())?;

        info!(
            "Restore of backup {} requested for {} tables",
            record.id,
            targets.len()
        );

        // Verifying
        let skip_verify = !request.options.verify_before && record.verified == VerificationStatus::Passed;
        if skip_verify {
            info!("Skipping verification of backup {} (verified at creation)", record.id);
        } else {
            transition(&record.id, &mut phase, RestorePhase::Verifying);
            let report = self.verifier.verify(&record.id).await?;
            if !report.valid {
                transition(&record.id, &mut phase, RestorePhase::Failed);
                let corruption = report.first_error.unwrap_or_else(|| CorruptionError {
                    table: None,
                    line: 0,
                    offset: 0,
                    reason: "verification failed".to_string(),
                });
                error!("Refusing to restore corrupted backup {}: {}", record.id, corruption);
                return Err(BackupError::Corruption(corruption));
            }
        }

        // SafetyBackupInProgress
        let mut safety_backup_id = None;
        if request.options.create_safety_backup {
            transition(&record.id, &mut phase, RestorePhase::SafetyBackupInProgress);
            let options = BackupOptions {
                description: format!("safety backup before restoring {}", record.id),
                compress: record.compressed,
                verify: true,
                tables: Some(targets.iter().map(|e| e.name.clone()).collect()),
            };
            match self.writer.write(&options).await {
                Ok(safety) if safety.verified == VerificationStatus::Passed => {
                    info!("Safety backup {} created", safety.id);
                    safety_backup_id = Some(safety.id);
                }
                Ok(safety) => {
                    transition(&record.id, &mut phase, RestorePhase::Failed);
                    return Err(BackupError::Capture {
                        table: "*".to_string(),
                        reason: format!("safety backup {} failed verification", safety.id),
                    });
                }
                Err(e) => {
                    transition(&record.id, &mut phase, RestorePhase::Failed);
                    error!("Safety backup failed, aborting restore: {}", e);
                    return Err(e);
                }
            }
        }

        // Applying
        transition(&record.id, &mut phase, RestorePhase::Applying);
        let wanted: BTreeSet<String> = targets.iter().map(|e| e.name.clone()).collect();
        let path = PathBuf::from(&record.file_path);
        let mut segments = tokio::task::spawn_blocking(move || read_segments(&path, &wanted))
            .await
            .map_err(|e| BackupError::storage(format!("snapshot read task failed: {}", e)))??;

        let mut restored_tables = Vec::new();
        let mut errors = Vec::new();

        for entry in &targets {
            let Some(rows) = segments.remove(&entry.name) else {
                warn!("Snapshot of backup {} has no segment for {}", record.id, entry.name);
                errors.push(TableError {
                    table: entry.name.clone(),
                    kind: TableErrorKind::Apply,
                    message: "segment missing from snapshot".to_string(),
                });
                continue;
            };
            match self.apply_table(&entry.name, rows).await {
                Ok(inserted) => {
                    info!("Restored table {} ({} rows)", entry.name, inserted);
                    restored_tables.push(TableEntry {
                        name: entry.name.clone(),
                        row_count: inserted,
                    });
                }
                Err(e) => {
                    warn!("Table {} rolled back: {}", entry.name, e);
                    errors.push(TableError {
                        table: entry.name.clone(),
                        kind: TableErrorKind::Apply,
                        message: e.to_string(),
                    });
                }
            }
        }

        if request.options.verify_after {
            for restored in &restored_tables {
                if let Some(mismatch) = self.check_row_count(&record, &restored.name).await {
                    warn!("{}", mismatch);
                    errors.push(TableError {
                        table: restored.name.clone(),
                        kind: TableErrorKind::ManifestMismatch,
                        message: mismatch.to_string(),
                    });
                }
            }
        }

        let success = errors.is_empty();
        let final_phase = if success {
            RestorePhase::Completed
        } else {
            RestorePhase::Failed
        };
        transition(&record.id, &mut phase, final_phase);

        Ok(RestoreResult {
            backup_id: record.id,
            success,
            phase,
            restored_tables,
            errors,
            safety_backup_id,
        })
    }

    async fn apply_table(&self, table: &str, rows: Vec<RowStatement>) -> BackupResult<u64> {
        let mut statements = Vec::with_capacity(rows.len() + 1);
        statements.push(Statement::ClearTable);
        statements.extend(rows.into_iter().map(|r| Statement::InsertRow(r.into_row())));

        self.store
            .execute_in_transaction(table, &statements)
            .await
            .map_err(|e| match e {
                BackupError::Apply { .. } => e,
                other => BackupError::Apply {
                    table: table.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    async fn check_row_count(&self, record: &BackupRecord, table: &str) -> Option<BackupError> {
        let expected = record.table_manifest.row_count(table)?;
        match self.store.count_rows(table).await {
            Ok(actual) if actual == expected => None,
            Ok(actual) => Some(BackupError::ManifestMismatch {
                table: table.to_string(),
                expected,
                actual,
            }),
            Err(e) => {
                warn!("Could not count rows of {}: {}", table, e);
                Some(BackupError::storage(format!(
                    "row count check for '{}' failed: {}",
                    table, e
                )))
            }
        }
    }
}

/// Tables to restore, in manifest order
fn resolve_targets(record: &BackupRecord, requested: Option<&[String]>) -> BackupResult<Vec<TableEntry>> {
    let Some(requested) = requested else {
        return Ok(record.table_manifest.iter().cloned().collect());
    };

    if requested.is_empty() {
        return Err(BackupError::InvalidRequest {
            reason: "table subset is empty".to_string(),
        });
    }
    for table in requested {
        if !record.table_manifest.contains(table) {
            return Err(BackupError::table_not_found(table, Some(&record.id)));
        }
    }

    Ok(record
        .table_manifest
        .iter()
        .filter(|entry| requested.contains(&entry.name))
        .cloned()
        .collect())
}

fn transition(backup_id: &str, phase: &mut RestorePhase, next: RestorePhase) {
    info!("Restore {}: {} -> {}", backup_id, phase, next);
    *phase = next;
}
