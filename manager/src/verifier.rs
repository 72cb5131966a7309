//! Integrity verifier.
//!
//! Parses a snapshot segment by segment without touching the live store and
//! checks that:
//!
//! - the header is present and of a supported format version
//! - segments appear in strictly increasing table order
//! - every segment holds exactly the number of rows its marker declares
//! - every row statement parses and belongs to its segment
//! - the `END` trailer is present and matches the segment count
//! - the parsed manifest agrees with the catalog's manifest
//!
//! The first defect stops verification and is reported with its table, line
//! and byte offset. Verification only reads the file; running it repeatedly or
//! concurrently is safe.

use serde::Serialize;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::catalog::{BackupCatalog, TableManifest, VerificationStatus};
use crate::errors::{BackupError, BackupResult, CorruptionError};
use crate::snapshot::format::{parse_line, SnapshotLine, FORMAT_VERSION};
use crate::snapshot::reader::{open_snapshot, LineCursor};

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub backup_id: String,
    pub valid: bool,
    pub table_manifest: TableManifest,
    pub first_error: Option<CorruptionError>,
}

#[derive(Clone)]
pub struct IntegrityVerifier {
    catalog: Arc<BackupCatalog>,
}

impl IntegrityVerifier {
    pub fn new(catalog: Arc<BackupCatalog>) -> Self {
        Self { catalog }
    }

    /// Verifies the snapshot of `backup_id` and records the verdict in the catalog
    #[instrument(skip(self))]
    pub async fn verify(&self, backup_id: &str) -> BackupResult<VerificationReport> {
        let record = self.catalog.get(backup_id).await?;
        let path = record.file_path.clone();

        let outcome = tokio::task::spawn_blocking(move || verify_file(Path::new(&path)))
            .await
            .map_err(|e| BackupError::storage(format!("verification task failed: {}", e)))?;

        let outcome = outcome.and_then(|manifest| {
            if manifest == record.table_manifest {
                Ok(manifest)
            } else {
                Err(CorruptionError {
                    table: None,
                    line: 0,
                    offset: 0,
                    reason: "snapshot contents disagree with the catalog manifest".to_string(),
                })
            }
        });

        let size_bytes = tokio::fs::metadata(&record.file_path)
            .await
            .map(|m| m.len())
            .unwrap_or(record.size_bytes);

        let report = match outcome {
            Ok(manifest) => {
                info!(
                    "Backup {} verified: {} tables, {} rows",
                    backup_id,
                    manifest.len(),
                    manifest.total_rows()
                );
                VerificationReport {
                    backup_id: backup_id.to_string(),
                    valid: true,
                    table_manifest: manifest,
                    first_error: None,
                }
            }
            Err(corruption) => {
                warn!("Backup {} failed verification: {}", backup_id, corruption);
                VerificationReport {
                    backup_id: backup_id.to_string(),
                    valid: false,
                    table_manifest: record.table_manifest.clone(),
                    first_error: Some(corruption),
                }
            }
        };

        let status = if report.valid {
            VerificationStatus::Passed
        } else {
            VerificationStatus::Failed
        };
        self.catalog
            .update_verification(backup_id, status, size_bytes)
            .await?;

        Ok(report)
    }
}

/// Parses the snapshot at `path`, returning the manifest it actually contains
pub fn verify_file(path: &Path) -> Result<TableManifest, CorruptionError> {
    let reader = open_snapshot(path).map_err(|e| CorruptionError {
        table: None,
        line: 0,
        offset: 0,
        reason: e.to_string(),
    })?;
    verify_stream(reader)
}

struct SegmentState {
    name: String,
    declared: u64,
    seen: u64,
}

pub fn verify_stream<R: BufRead>(reader: R) -> Result<TableManifest, CorruptionError> {
    let mut cursor = LineCursor::new(reader);
    let mut manifest = TableManifest::new();
    let mut segment: Option<SegmentState> = None;
    let mut previous_table: Option<String> = None;
    let mut ended = false;

    let header = cursor.next_line()?.ok_or_else(|| CorruptionError {
        table: None,
        line: 1,
        offset: 0,
        reason: "empty snapshot: missing header".to_string(),
    })?;
    match parse_line(&header.text) {
        Ok(SnapshotLine::Header(h)) if h.version == FORMAT_VERSION => {}
        Ok(SnapshotLine::Header(h)) => {
            return Err(CorruptionError {
                table: None,
                line: header.number,
                offset: header.offset,
                reason: format!("unsupported format version {}", h.version),
            })
        }
        _ => {
            return Err(CorruptionError {
                table: None,
                line: header.number,
                offset: header.offset,
                reason: "missing snapshot header".to_string(),
            })
        }
    }

    while let Some(line) = cursor.next_line()? {
        let current_table = segment.as_ref().map(|s| s.name.clone());
        let fail = |reason: String| CorruptionError {
            table: current_table.clone(),
            line: line.number,
            offset: line.offset,
            reason,
        };

        if ended {
            return Err(fail("data after END trailer".to_string()));
        }
        if !line.terminated {
            return Err(fail("truncated line at end of snapshot".to_string()));
        }

        match parse_line(&line.text).map_err(&fail)? {
            SnapshotLine::Header(_) => return Err(fail("duplicate snapshot header".to_string())),
            SnapshotLine::Table { name, row_count } => {
                close_segment(segment.take(), &mut manifest).map_err(&fail)?;
                if let Some(previous) = &previous_table {
                    if name.as_str() <= previous.as_str() {
                        return Err(fail(format!(
                            "segment '{}' out of order after '{}'",
                            name, previous
                        )));
                    }
                }
                previous_table = Some(name.clone());
                segment = Some(SegmentState {
                    name,
                    declared: row_count,
                    seen: 0,
                });
            }
            SnapshotLine::Insert(statement) => {
                let state = segment
                    .as_mut()
                    .ok_or_else(|| fail("row statement outside of a table segment".to_string()))?;
                if statement.table != state.name {
                    return Err(fail(format!(
                        "row for table '{}' inside segment '{}'",
                        statement.table, state.name
                    )));
                }
                state.seen += 1;
                if state.seen > state.declared {
                    return Err(fail(format!(
                        "segment declares {} rows but holds more",
                        state.declared
                    )));
                }
            }
            SnapshotLine::End { segment_count } => {
                close_segment(segment.take(), &mut manifest).map_err(&fail)?;
                if segment_count != manifest.len() as u64 {
                    return Err(fail(format!(
                        "trailer declares {} segments but {} were found",
                        segment_count,
                        manifest.len()
                    )));
                }
                ended = true;
            }
        }
    }

    if !ended {
        let (line, offset) = cursor.position();
        return Err(CorruptionError {
            table: segment.map(|s| s.name),
            line,
            offset,
            reason: "missing END trailer: snapshot is truncated".to_string(),
        });
    }

    Ok(manifest)
}

fn close_segment(segment: Option<SegmentState>, manifest: &mut TableManifest) -> Result<(), String> {
    if let Some(state) = segment {
        if state.seen != state.declared {
            return Err(format!(
                "segment '{}' declares {} rows but holds {}",
                state.name, state.declared, state.seen
            ));
        }
        manifest.push(state.name, state.seen);
    }
    Ok(())
}
