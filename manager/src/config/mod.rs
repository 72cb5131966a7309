pub mod manager;
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

use crate::constants::defaults;
use crate::services::BackupSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Live data store the backups are taken from
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Catalog database; kept apart from the live store so a restore never touches it
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_true")]
    pub compress_by_default: bool,
    #[serde(default = "default_true")]
    pub verify_on_create: bool,
    // 6-field cron (sec min hour day month dow)
    pub backup_schedule: Option<String>,
    pub retention_count: Option<usize>,
    #[serde(default)]
    pub excluded_tables: Vec<String>,
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_catalog_path() -> String {
    defaults::CATALOG_PATH.to_string()
}

fn default_backup_dir() -> String {
    defaults::BACKUP_DIR.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            catalog_path: default_catalog_path(),
            backup_dir: default_backup_dir(),
            compress_by_default: true,
            verify_on_create: true,
            backup_schedule: None,
            retention_count: None,
            excluded_tables: Vec::new(),
        }
    }
}

impl Config {
    pub fn backup_settings(&self) -> BackupSettings {
        BackupSettings {
            backup_dir: self.backup_dir.clone(),
            compress_by_default: self.compress_by_default,
            verify_on_create: self.verify_on_create,
            excluded_tables: self.excluded_tables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("port = 9000").unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, defaults::HOST);
        assert_eq!(config.backup_dir, defaults::BACKUP_DIR);
        assert!(config.compress_by_default);
        assert!(config.verify_on_create);
        assert!(config.backup_schedule.is_none());
        assert!(config.excluded_tables.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            host = "127.0.0.1"
            port = 8100
            database_path = "/var/lib/shop/shop.db"
            catalog_path = "/var/lib/shop/catalog.db"
            backup_dir = "/var/backups/shop"
            compress_by_default = false
            verify_on_create = false
            backup_schedule = "0 0 3 * * *"
            retention_count = 7
            excluded_tables = ["sessions", "cache_entries"]
        "#;
        let config: Config = toml::from_str(content).unwrap();

        assert_eq!(config.retention_count, Some(7));
        assert_eq!(config.backup_schedule.as_deref(), Some("0 0 3 * * *"));
        assert_eq!(config.excluded_tables, vec!["sessions", "cache_entries"]);

        let settings = config.backup_settings();
        assert!(!settings.compress_by_default);
        assert!(!settings.verify_on_create);
        assert_eq!(settings.backup_dir, "/var/backups/shop");
    }
}
