//! Cron-based scheduled backups
//!
//! When `backup_schedule` is configured, a job creates a backup with the
//! description `scheduled backup` and then applies the retention count, if
//! one is set.
//!
//! # Configuration
//!
//! ```toml
//! backup_schedule = "0 0 3 * * *"  # Daily at 3 AM
//! retention_count = 7
//! ```
//!
//! Schedules use the 6-field cron format of tokio-cron-scheduler
//! (sec min hour day month dow).

pub mod cron;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument, warn};

use crate::constants::defaults::SCHEDULED_DESCRIPTION;
use crate::services::{BackupService, CreateBackupRequest};
use crate::store::DataStore;

pub struct BackupScheduler<S: DataStore + 'static> {
    backup_service: Arc<BackupService<S>>,
    schedule: Option<String>,
    retention_count: Option<usize>,
    scheduler: JobScheduler,
}

impl<S: DataStore + 'static> BackupScheduler<S> {
    pub async fn new(
        backup_service: Arc<BackupService<S>>,
        schedule: Option<String>,
        retention_count: Option<usize>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            backup_service,
            schedule,
            retention_count,
            scheduler,
        })
    }

    /// Returns whether a job was scheduled
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<bool> {
        let Some(schedule) = self.schedule.clone() else {
            info!("No backup schedule configured - scheduler not started");
            return Ok(false);
        };

        self.schedule_backup_job(schedule.clone()).await?;
        self.scheduler.start().await
            .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;
        info!("Backup scheduler started: '{}'", schedule);
        Ok(true)
    }

    async fn schedule_backup_job(&self, schedule: String) -> Result<()> {
        cron::validate_6_field_cron(&schedule)
            .map_err(|e| anyhow!("Invalid 6-field cron schedule '{}': {}", schedule, e))?;

        let backup_service = self.backup_service.clone();
        let retention_count = self.retention_count;

        let job = Job::new_async(schedule.as_str(), move |_uuid, _scheduler| {
            let backup_service = backup_service.clone();

            Box::pin(async move {
                run_scheduled_backup(&backup_service, retention_count).await;
            })
        })
        .map_err(|e| anyhow!("Failed to create backup job for '{}': {}", schedule, e))?;

        self.scheduler.add(job).await
            .map_err(|e| anyhow!("Failed to add backup job to scheduler: {}", e))?;

        Ok(())
    }
}

/// One scheduled run: backup, then retention. Retention is skipped when the backup fails.
pub async fn run_scheduled_backup<S: DataStore + 'static>(
    backup_service: &BackupService<S>,
    retention_count: Option<usize>,
) {
    info!("Executing scheduled backup");

    let request = CreateBackupRequest {
        description: SCHEDULED_DESCRIPTION.to_string(),
        ..CreateBackupRequest::default()
    };

    match backup_service.create_backup(request).await {
        Ok(record) => info!(
            "Scheduled backup {} completed ({} tables, {} bytes, verification {})",
            record.id,
            record.table_manifest.len(),
            record.size_bytes,
            record.verified
        ),
        Err(e) => {
            error!("Scheduled backup failed: {}", e);
            return;
        }
    }

    if let Some(retention) = retention_count {
        match backup_service.cleanup_old_backups(retention).await {
            Ok(report) if !report.skipped_busy.is_empty() => warn!(
                "Retention kept {} busy backups beyond the limit",
                report.skipped_busy.len()
            ),
            Ok(_) => {}
            Err(e) => error!("Retention cleanup after scheduled backup failed: {}", e),
        }
    }
}
