//! Central repository for format constants and defaults
//!
//! Organised by category so every magic number has one home.

/// Snapshot file constants
pub mod snapshot {
    /// Extension of uncompressed snapshot files
    pub const PLAIN_EXTENSION: &str = "snap";

    /// Extension of zstd-compressed snapshot files
    pub const COMPRESSED_EXTENSION: &str = "snap.zst";

    /// Suffix appended to a snapshot path while it is being written
    pub const TEMP_SUFFIX: &str = ".tmp";

    /// zstd compression level (favours speed; snapshots are written online)
    pub const ZSTD_LEVEL: i32 = 3;
}

/// Restore defaults
pub mod restore {
    pub const DEFAULT_VERIFY_BEFORE: bool = true;
    pub const DEFAULT_VERIFY_AFTER: bool = true;
}

/// Configuration defaults
pub mod defaults {
    pub const CONFIG_DIR: &str = "config";
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8096;
    pub const DATABASE_PATH: &str = "data/shop.db";
    pub const CATALOG_PATH: &str = "data/backup_catalog.db";
    pub const BACKUP_DIR: &str = "data/backups";
    pub const SCHEDULED_DESCRIPTION: &str = "scheduled backup";
}

/// Operation types tracked per backup
pub mod operations {
    pub const RESTORE: &str = "restore";
    pub const DELETE: &str = "delete";
}
