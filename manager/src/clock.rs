//! Naming and clock source for new backups.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait BackupClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Collision-free identifier for a backup created at `at`
    fn new_backup_id(&self, at: DateTime<Utc>) -> String;
}

/// Wall clock plus random suffix: `backup_20250115_120000_1a2b3c4d`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BackupClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_backup_id(&self, at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("backup_{}_{}", at.format("%Y%m%d_%H%M%S"), &suffix[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_backup_id_format() {
        let clock = SystemClock;
        let at = DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = clock.new_backup_id(at);

        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4, "Should have prefix, date, time and suffix");
        assert_eq!(parts[0], "backup");
        assert_eq!(parts[1], "20250115");
        assert_eq!(parts[2], "120000");
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn test_ids_generated_in_same_second_do_not_collide() {
        let clock = SystemClock;
        let at = clock.now();
        let ids: HashSet<String> = (0..1000).map(|_| clock.new_backup_id(at)).collect();
        assert_eq!(ids.len(), 1000);
    }
}
