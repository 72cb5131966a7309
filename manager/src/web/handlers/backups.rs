// Backup and restore endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::common::{error_response, ApiResponse, ApiResult, RestoreTablesBody, RetentionQuery};
use crate::catalog::{BackupRecord, CatalogStats, TableManifest};
use crate::restore::{RestoreOptions, RestoreResult};
use crate::services::{CleanupReport, CreateBackupRequest};
use crate::verifier::VerificationReport;
use crate::web::AppState;

/// Create a backup of the live store
pub async fn create_backup(
    State(state): State<AppState>,
    Json(request): Json<CreateBackupRequest>,
) -> ApiResult<BackupRecord> {
    info!("Backup creation requested: '{}'", request.description);

    match state.backup_service.create_backup(request).await {
        Ok(record) => {
            info!("Backup {} created", record.id);
            Ok(Json(ApiResponse::success(record)))
        }
        Err(e) => {
            error!("Failed to create backup: {}", e);
            Err(error_response(e))
        }
    }
}

/// List every backup, newest first
pub async fn list_backups(State(state): State<AppState>) -> ApiResult<Vec<BackupRecord>> {
    state
        .backup_service
        .list_backups()
        .await
        .map(|backups| Json(ApiResponse::success(backups)))
        .map_err(|e| {
            error!("Failed to list backups: {}", e);
            error_response(e)
        })
}

pub async fn get_backup_stats(State(state): State<AppState>) -> ApiResult<CatalogStats> {
    state
        .backup_service
        .stats()
        .await
        .map(|stats| Json(ApiResponse::success(stats)))
        .map_err(error_response)
}

pub async fn get_backup(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<BackupRecord> {
    state
        .backup_service
        .get_backup_info(&backup_id)
        .await
        .map(|record| Json(ApiResponse::success(record)))
        .map_err(error_response)
}

/// Tables that can be restored from a backup
pub async fn get_recovery_options(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<TableManifest> {
    state
        .backup_service
        .get_recovery_options(&backup_id)
        .await
        .map(|manifest| Json(ApiResponse::success(manifest)))
        .map_err(error_response)
}

/// Test restore: verification only, the live store is not touched
pub async fn verify_backup(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<VerificationReport> {
    info!("Verification requested for backup {}", backup_id);

    match state.backup_service.test_restore(&backup_id).await {
        Ok(report) => {
            if !report.valid {
                warn!("Backup {} failed verification", backup_id);
            }
            Ok(Json(ApiResponse::success(report)))
        }
        Err(e) => {
            error!("Failed to verify backup {}: {}", backup_id, e);
            Err(error_response(e))
        }
    }
}

pub async fn restore_backup(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
    Json(options): Json<RestoreOptions>,
) -> ApiResult<RestoreResult> {
    info!("Restore requested from backup {}", backup_id);

    match state.backup_service.restore(&backup_id, options).await {
        Ok(result) => {
            if !result.success {
                warn!(
                    "Restore from {} finished with {} table errors",
                    backup_id,
                    result.errors.len()
                );
            }
            Ok(Json(ApiResponse::success(result)))
        }
        Err(e) => {
            error!("Restore from backup {} failed: {}", backup_id, e);
            Err(error_response(e))
        }
    }
}

pub async fn restore_tables(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RestoreTablesBody>,
) -> ApiResult<RestoreResult> {
    info!(
        "Restore of tables {:?} requested from backup {}",
        body.tables, backup_id
    );

    state
        .backup_service
        .restore_specific_tables(&backup_id, &body.tables)
        .await
        .map(|result| Json(ApiResponse::success(result)))
        .map_err(|e| {
            error!("Table restore from backup {} failed: {}", backup_id, e);
            error_response(e)
        })
}

pub async fn delete_backup(
    Path(backup_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    info!("Backup deletion requested for {}", backup_id);

    match state.backup_service.delete_backup(&backup_id).await {
        Ok(()) => Ok(Json(ApiResponse::success(json!({
            "message": format!("Backup {} deleted successfully", backup_id),
            "backup_id": backup_id,
            "status": "completed"
        })))),
        Err(e) => {
            error!("Failed to delete backup {}: {}", backup_id, e);
            Err(error_response(e))
        }
    }
}

/// Remove backups beyond the retention count
pub async fn cleanup_old_backups(
    Query(query): Query<RetentionQuery>,
    State(state): State<AppState>,
) -> ApiResult<CleanupReport> {
    info!(
        "Backup cleanup requested (retention: {})",
        query.retention_count
    );

    state
        .backup_service
        .cleanup_old_backups(query.retention_count)
        .await
        .map(|report| Json(ApiResponse::success(report)))
        .map_err(|e| {
            error!("Backup cleanup failed: {}", e);
            error_response(e)
        })
}
