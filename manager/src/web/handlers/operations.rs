// Operation tracking endpoints

use axum::{extract::State, response::Json};

use super::common::{ApiResponse, ApiResult};
use crate::operation_tracker::OperationStatus;
use crate::web::AppState;

/// Backups currently locked by a restore or delete
pub async fn get_active_operations(State(state): State<AppState>) -> ApiResult<OperationStatus> {
    let operations = state.backup_service.operation_status().await;
    Ok(Json(ApiResponse::success(operations)))
}
