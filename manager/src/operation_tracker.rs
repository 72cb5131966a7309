//! Operation tracking for backups
//!
//! Marks a backup as busy while an operation that depends on its file is
//! running, so that, for example, a backup cannot be deleted halfway through
//! a restore from it.
//!
//! # Usage
//!
//! ```ignore
//! tracker.try_start_operation("backup_20250115_120000_1a2b3c4d", "restore").await?;
//! // Perform operation...
//! tracker.finish_operation("backup_20250115_120000_1a2b3c4d").await;
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::errors::{BackupError, BackupResult};

#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub operation_type: String,
    pub backup_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub busy_backups: HashMap<String, ActiveOperation>,
    pub total_active: usize,
}

#[derive(Default)]
pub struct OperationTracker {
    active_operations: Arc<RwLock<HashMap<String, ActiveOperation>>>, // backup_id -> operation
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Busy` if the backup already has an operation running
    #[instrument(skip(self), fields(backup = %backup_id, operation = %operation_type))]
    pub async fn try_start_operation(&self, backup_id: &str, operation_type: &str) -> BackupResult<()> {
        let mut active = self.active_operations.write().await;

        if let Some(current_op) = active.get(backup_id) {
            return Err(BackupError::Busy {
                backup_id: backup_id.to_string(),
                operation: current_op.operation_type.clone(),
            });
        }

        active.insert(
            backup_id.to_string(),
            ActiveOperation {
                operation_type: operation_type.to_string(),
                backup_id: backup_id.to_string(),
                started_at: Utc::now(),
            },
        );
        info!("Started operation '{}' on {}", operation_type, backup_id);
        Ok(())
    }

    #[instrument(skip(self), fields(backup = %backup_id))]
    pub async fn finish_operation(&self, backup_id: &str) {
        let mut active = self.active_operations.write().await;
        if let Some(op) = active.remove(backup_id) {
            let duration = Utc::now().signed_duration_since(op.started_at);
            info!(
                "Finished operation '{}' on {} (took {}ms)",
                op.operation_type,
                backup_id,
                duration.num_milliseconds()
            );
        }
    }

    pub async fn get_operation_status(&self) -> OperationStatus {
        let active = self.active_operations.read().await;
        OperationStatus {
            busy_backups: active.clone(),
            total_active: active.len(),
        }
    }

    pub async fn is_busy(&self, backup_id: &str) -> bool {
        self.active_operations.read().await.contains_key(backup_id)
    }
}
