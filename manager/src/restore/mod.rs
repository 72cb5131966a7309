//! Restore engine.
//!
//! Applies a verified snapshot back onto the live store, either in full or for
//! a subset of its tables.
//!
//! # Restore Process
//!
//! `Requested -> Verifying -> (SafetyBackupInProgress) -> Applying -> Completed | Failed`
//!
//! 1. Verify the snapshot (skippable only for backups already marked passed)
//! 2. Optionally capture the tables about to be overwritten as a safety backup
//! 3. For each target table, clear and repopulate it in one transaction
//! 4. Optionally compare live row counts with the manifest
//!
//! Verification and safety-backup failures abort before any mutation. Apply
//! failures roll back the failing table only; the remaining tables are still
//! attempted and the result lists exactly which ones succeeded.

mod engine;
mod types;

pub use engine::RestoreEngine;
pub use types::*;
