//! Backup catalog.
//!
//! Durable SQLite index of every snapshot the engine has written. The catalog
//! lives in its own database file so that restoring the live store can never
//! rewrite it.
//!
//! - `records` - `BackupRecord` and friends
//! - `backups` - insert/list/get/update/remove operations

mod backups;
mod records;

pub use records::*;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{error, info};

pub struct BackupCatalog {
    pool: Pool<Sqlite>,
}

impl BackupCatalog {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn open(catalog_path: &str) -> Result<Self> {
        info!("Opening backup catalog: {}", catalog_path);

        if let Some(parent) = Path::new(catalog_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create catalog directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", catalog_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("FAILED to connect to catalog: {}", e);
                error!("   Connection URL: {}", database_url);
                return Err(e.into());
            }
        };

        let catalog = Self { pool };
        catalog.initialize_tables().await?;
        info!("Backup catalog ready");
        Ok(catalog)
    }

    /// Catalog backed by a private in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let catalog = Self { pool };
        catalog.initialize_tables().await?;
        Ok(catalog)
    }

    async fn initialize_tables(&self) -> Result<()> {
        let records_table_sql = r#"
            CREATE TABLE IF NOT EXISTS backup_records (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                file_path TEXT NOT NULL,
                compressed BOOLEAN NOT NULL,
                table_manifest TEXT NOT NULL,
                verified TEXT NOT NULL,
                size_bytes INTEGER NOT NULL
            )
        "#;

        if let Err(e) = sqlx::query(records_table_sql).execute(&self.pool).await {
            error!("FAILED to create backup_records table: {}", e);
            return Err(e.into());
        }

        let created_index_sql =
            "CREATE INDEX IF NOT EXISTS idx_backup_records_created ON backup_records(created_at DESC)";
        if let Err(e) = sqlx::query(created_index_sql).execute(&self.pool).await {
            error!("FAILED to create backup_records index: {}", e);
            return Err(e.into());
        }

        Ok(())
    }
}
