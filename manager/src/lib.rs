pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod operation_tracker;
pub mod restore;
pub mod scheduler;
pub mod services;
pub mod snapshot;
pub mod store;
pub mod verifier;
pub mod web;

// Re-export commonly used types
pub use catalog::{BackupCatalog, BackupRecord, TableManifest, VerificationStatus};
pub use clock::{BackupClock, SystemClock};
pub use config::{Config, ConfigManager};
pub use errors::{BackupError, BackupResult, CorruptionError};
pub use operation_tracker::OperationTracker;
pub use restore::{RestoreEngine, RestoreOptions, RestorePhase, RestoreRequest, RestoreResult};
pub use services::{BackupService, CreateBackupRequest};
pub use snapshot::{BackupOptions, SnapshotWriter};
pub use store::{DataStore, SqliteStore};
pub use verifier::{IntegrityVerifier, VerificationReport};
