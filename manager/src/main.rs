use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use backup_manager::constants::defaults;
use backup_manager::scheduler::BackupScheduler;
use backup_manager::web::{start_web_server, AppState};
use backup_manager::{BackupCatalog, BackupService, ConfigManager, SqliteStore, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("backup_manager=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting Backup Manager");

    // Load configuration
    let config_dir =
        std::env::var("BACKUP_CONFIG_DIR").unwrap_or_else(|_| defaults::CONFIG_DIR.to_string());
    let config_manager = ConfigManager::new(config_dir).await?;
    let config = config_manager.get_current_config();

    // Live store and catalog live in separate database files
    let store = Arc::new(SqliteStore::connect(&config.database_path).await?);
    info!("Data store opened at {}", config.database_path);

    let catalog = Arc::new(BackupCatalog::open(&config.catalog_path).await?);
    info!("Backup catalog opened at {}", config.catalog_path);

    let backup_service = Arc::new(BackupService::new(
        store,
        catalog,
        Arc::new(SystemClock),
        config.backup_settings(),
    ));

    match backup_service.cleanup_stale_temp_files() {
        Ok(0) => {}
        Ok(removed) => warn!("Removed {} stale temp snapshots from {}", removed, config.backup_dir),
        Err(e) => warn!("Stale temp snapshot cleanup failed: {}", e),
    }

    let stats = backup_service.stats().await?;
    info!(
        "Catalog holds {} backups ({} bytes, {} failed verification)",
        stats.total_backups, stats.total_size_bytes, stats.verified_failed
    );

    // Scheduler must outlive the web server
    let scheduler = BackupScheduler::new(
        backup_service.clone(),
        config.backup_schedule.clone(),
        config.retention_count,
    )
    .await?;
    scheduler.start().await?;

    start_web_server(AppState::new(config, backup_service)).await?;

    Ok(())
}
