// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::BackupError;

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub fn status_for(error: &BackupError) -> StatusCode {
    match error {
        BackupError::NotFound(_) => StatusCode::NOT_FOUND,
        BackupError::Busy { .. } => StatusCode::CONFLICT,
        BackupError::Corruption(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BackupError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: BackupError) -> (StatusCode, Json<ApiResponse<()>>) {
    (status_for(&error), Json(ApiResponse::error(error.to_string())))
}

// Query parameters
#[derive(Deserialize)]
pub struct RetentionQuery {
    pub retention_count: usize,
}

#[derive(Deserialize)]
pub struct RestoreTablesBody {
    pub tables: Vec<String>,
}
