use super::Config;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);
        let main_config_content = fs::read_to_string(&main_config_path).await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let config: Config = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        Self::validate(&config)?;

        info!(
            "Loaded config: backups in {}, catalog at {}, schedule {}, {} excluded tables",
            config.backup_dir,
            config.catalog_path,
            config.backup_schedule.as_deref().unwrap_or("none"),
            config.excluded_tables.len()
        );

        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<()> {
        if config.port == 0 {
            return Err(anyhow!("port must be non-zero"));
        }
        if config.backup_dir.trim().is_empty() {
            return Err(anyhow!("backup_dir must not be empty"));
        }
        if config.retention_count == Some(0) {
            return Err(anyhow!("retention_count must be at least 1 when set"));
        }
        if config.database_path == config.catalog_path {
            return Err(anyhow!("catalog_path must differ from database_path"));
        }
        Ok(())
    }
}
