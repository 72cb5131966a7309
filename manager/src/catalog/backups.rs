//! Backup record operations.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::io::ErrorKind;
use tracing::{debug, error, info, warn};

use super::records::{BackupRecord, CatalogStats, TableManifest, VerificationStatus};
use super::BackupCatalog;
use crate::errors::{BackupError, BackupResult};

const SELECT_RECORD: &str = r#"
    SELECT id, description, created_at, file_path, compressed,
           table_manifest, verified, size_bytes
    FROM backup_records
"#;

impl BackupCatalog {
    /// Registers a record whose file is already durably in place.
    /// Fails if the id is already taken.
    pub async fn insert(&self, record: &BackupRecord) -> BackupResult<()> {
        debug!("Registering backup record: {}", record.id);

        let manifest_json = serde_json::to_string(&record.table_manifest)
            .map_err(|e| BackupError::storage(format!("manifest serialization: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO backup_records (
                id, description, created_at, file_path, compressed,
                table_manifest, verified, size_bytes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.description)
        .bind(record.created_at)
        .bind(&record.file_path)
        .bind(record.compressed)
        .bind(manifest_json)
        .bind(record.verified.as_str())
        .bind(record.size_bytes as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to register backup {}: {}", record.id, e);
            BackupError::from(e)
        })?;

        Ok(())
    }

    /// All records, most recent first
    pub async fn list(&self) -> BackupResult<Vec<BackupRecord>> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC", SELECT_RECORD);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn get(&self, id: &str) -> BackupResult<BackupRecord> {
        let sql = format!("{} WHERE id = ?", SELECT_RECORD);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(BackupError::backup_not_found(id)),
        }
    }

    pub async fn update_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        size_bytes: u64,
    ) -> BackupResult<()> {
        let result = sqlx::query("UPDATE backup_records SET verified = ?, size_bytes = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(size_bytes as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackupError::backup_not_found(id));
        }

        debug!("Backup {} verification status set to {}", id, status);
        Ok(())
    }

    /// Deletes the catalog entry and its snapshot file as one unit. If the
    /// file cannot be deleted the entry is kept. A file that is already gone
    /// does not block removal of its entry.
    pub async fn remove(&self, id: &str) -> BackupResult<()> {
        let record = self.get(id).await?;

        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM backup_records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(BackupError::backup_not_found(id));
        }

        match tokio::fs::remove_file(&record.file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Snapshot file for backup {} was already missing: {}",
                    id, record.file_path
                );
            }
            Err(e) => {
                error!(
                    "Failed to delete snapshot file {} for backup {}: {}",
                    record.file_path, id, e
                );
                tx.rollback().await?;
                return Err(BackupError::io(&record.file_path, e));
            }
        }

        tx.commit().await?;
        info!("Removed backup {} ({})", id, record.file_path);
        Ok(())
    }

    pub async fn stats(&self) -> BackupResult<CatalogStats> {
        let records = self.list().await?;

        let count_status = |status: VerificationStatus| {
            records.iter().filter(|r| r.verified == status).count()
        };

        Ok(CatalogStats {
            total_backups: records.len(),
            total_size_bytes: records.iter().map(|r| r.size_bytes).sum(),
            oldest_backup: records.iter().map(|r| r.created_at).min(),
            newest_backup: records.iter().map(|r| r.created_at).max(),
            verified_passed: count_status(VerificationStatus::Passed),
            verified_failed: count_status(VerificationStatus::Failed),
            verified_unknown: count_status(VerificationStatus::Unknown),
        })
    }
}

fn record_from_row(row: &SqliteRow) -> BackupResult<BackupRecord> {
    let manifest_json: String = row.try_get("table_manifest")?;
    let table_manifest: TableManifest = serde_json::from_str(&manifest_json)
        .map_err(|e| BackupError::storage(format!("manifest deserialization: {}", e)))?;

    let verified: String = row.try_get("verified")?;
    let verified = verified
        .parse::<VerificationStatus>()
        .map_err(BackupError::storage)?;

    let size_bytes: i64 = row.try_get("size_bytes")?;

    Ok(BackupRecord {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        file_path: row.try_get("file_path")?,
        compressed: row.try_get("compressed")?,
        table_manifest,
        verified,
        size_bytes: size_bytes.max(0) as u64,
    })
}
