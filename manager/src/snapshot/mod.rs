//! Snapshot writer.
//!
//! Captures a set of tables from the live store into a self-describing
//! snapshot file and registers it in the catalog.
//!
//! # Capture Process
//!
//! 1. Resolve the tables to capture (requested set, or every live table minus
//!    the configured exclusions), in lexicographic order
//! 2. Stream each table as a `TABLE` segment of `INSERT` statements into a
//!    temp file, optionally zstd-compressed
//! 3. Flush, fsync and rename the temp file onto its final path
//! 4. Register the `BackupRecord` with `verified = unknown`
//! 5. Optionally run the integrity verifier and record its verdict
//!
//! Any failure before step 4 removes the temp file and leaves the catalog
//! untouched.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{RowStatement, SnapshotHeader, SnapshotLine};
pub use writer::SnapshotFileWriter;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::catalog::{BackupCatalog, BackupRecord, TableManifest, VerificationStatus};
use crate::clock::BackupClock;
use crate::constants::snapshot::{COMPRESSED_EXTENSION, PLAIN_EXTENSION};
use crate::errors::{BackupError, BackupResult};
use crate::store::DataStore;
use crate::verifier::IntegrityVerifier;

/// What to capture and how
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupOptions {
    pub description: String,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub verify: bool,
    /// Tables to capture; `None` means every live table not excluded
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

pub struct SnapshotWriter<S: DataStore> {
    store: Arc<S>,
    catalog: Arc<BackupCatalog>,
    verifier: IntegrityVerifier,
    clock: Arc<dyn BackupClock>,
    backup_dir: PathBuf,
    excluded_tables: BTreeSet<String>,
}

impl<S: DataStore> SnapshotWriter<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Arc<BackupCatalog>,
        clock: Arc<dyn BackupClock>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            verifier: IntegrityVerifier::new(catalog.clone()),
            store,
            catalog,
            clock,
            backup_dir: backup_dir.into(),
            excluded_tables: BTreeSet::new(),
        }
    }

    /// Tables skipped when the caller does not name tables explicitly
    pub fn with_excluded_tables(mut self, tables: impl IntoIterator<Item = String>) -> Self {
        self.excluded_tables = tables.into_iter().collect();
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    #[instrument(skip(self, options), fields(description = %options.description))]
    pub async fn write(&self, options: &BackupOptions) -> BackupResult<BackupRecord> {
        let tables = self.resolve_tables(options.tables.as_deref()).await?;

        let created_at = self.clock.now();
        let id = self.clock.new_backup_id(created_at);
        let extension = if options.compress {
            COMPRESSED_EXTENSION
        } else {
            PLAIN_EXTENSION
        };

        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| BackupError::io(self.backup_dir.display(), e))?;
        let final_path = self.backup_dir.join(format!("{}.{}", id, extension));

        info!(
            "Creating backup {} of {} tables into {}",
            id,
            tables.len(),
            final_path.display()
        );

        let header = SnapshotHeader {
            version: format::FORMAT_VERSION,
            backup_id: id.clone(),
            created_at: created_at.to_rfc3339(),
        };

        let (manifest, size_bytes) = self
            .capture_tables(&tables, &final_path, options.compress, &header)
            .await?;

        let record = BackupRecord {
            id: id.clone(),
            description: options.description.clone(),
            created_at,
            file_path: final_path.to_string_lossy().to_string(),
            compressed: options.compress,
            table_manifest: manifest,
            verified: VerificationStatus::Unknown,
            size_bytes,
        };

        if let Err(e) = self.catalog.insert(&record).await {
            error!("Failed to register backup {}, removing its file: {}", id, e);
            if let Err(remove_err) = tokio::fs::remove_file(&final_path).await {
                warn!(
                    "Could not remove unregistered snapshot {}: {}",
                    final_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }

        info!(
            "Backup {} created: {} tables, {} rows, {} bytes",
            id,
            record.table_manifest.len(),
            record.table_manifest.total_rows(),
            size_bytes
        );

        if !options.verify {
            return Ok(record);
        }

        let report = self.verifier.verify(&id).await?;
        let verified = self.catalog.get(&id).await?;
        if !report.valid {
            warn!(
                "Backup {} failed verification right after creation: {:?}",
                id, report.first_error
            );
        }
        Ok(verified)
    }

    async fn resolve_tables(&self, requested: Option<&[String]>) -> BackupResult<BTreeSet<String>> {
        let live = self.store.list_tables().await.map_err(|e| BackupError::Capture {
            table: "*".to_string(),
            reason: format!("listing tables: {}", e),
        })?;

        match requested {
            Some(requested) => {
                let mut tables = BTreeSet::new();
                for table in requested {
                    if !live.contains(table) {
                        return Err(BackupError::table_not_found(table, None));
                    }
                    tables.insert(table.clone());
                }
                if tables.is_empty() {
                    return Err(BackupError::InvalidRequest {
                        reason: "no tables requested".to_string(),
                    });
                }
                Ok(tables)
            }
            None => Ok(live
                .into_iter()
                .filter(|table| !self.excluded_tables.contains(table))
                .collect()),
        }
    }

    async fn capture_tables(
        &self,
        tables: &BTreeSet<String>,
        final_path: &Path,
        compress: bool,
        header: &SnapshotHeader,
    ) -> BackupResult<(TableManifest, u64)> {
        let path = final_path.to_path_buf();
        let header = header.clone();
        let mut file =
            run_blocking(move || SnapshotFileWriter::create(&path, compress, &header)).await?;
        let mut manifest = TableManifest::new();

        for table in tables {
            let rows = match self.store.read_rows(table).await {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Capture of table {} failed: {}", table, e);
                    file.abort();
                    return Err(BackupError::Capture {
                        table: table.clone(),
                        reason: e.to_string(),
                    });
                }
            };

            let row_count = rows.len() as u64;
            let name = table.clone();
            // An error inside the task drops the writer, which removes the temp file
            file = run_blocking(move || {
                file.begin_table(&name, row_count)?;
                for row in rows {
                    file.write_row(&RowStatement::from_row(&name, row))?;
                }
                Ok(file)
            })
            .await?;

            manifest.push(table.clone(), row_count);
            info!("Captured table {} ({} rows)", table, row_count);
        }

        let size_bytes = run_blocking(move || file.finish()).await?;
        Ok((manifest, size_bytes))
    }
}

/// Runs synchronous snapshot file work off the async workers
async fn run_blocking<T, F>(task: F) -> BackupResult<T>
where
    F: FnOnce() -> BackupResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| BackupError::storage(format!("snapshot write task failed: {}", e)))?
}
