//! Deterministic clock: every call advances one second from a fixed start

use backup_manager::clock::BackupClock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub struct TestClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupClock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::seconds(tick)
    }

    fn new_backup_id(&self, at: DateTime<Utc>) -> String {
        format!("backup_{}", at.format("%Y%m%d_%H%M%S"))
    }
}
