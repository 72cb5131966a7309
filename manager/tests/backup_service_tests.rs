//! Integration tests for the operator-facing backup service
//!
//! Covers request defaults, busy protection, retention cleanup, stale temp
//! file removal and the scheduled backup run.

mod common;

use backup_manager::catalog::VerificationStatus;
use backup_manager::constants::defaults::SCHEDULED_DESCRIPTION;
use backup_manager::errors::BackupError;
use backup_manager::restore::RestoreOptions;
use backup_manager::scheduler::run_scheduled_backup;
use backup_manager::services::CreateBackupRequest;
use common::fixtures::*;
use tokio_test::assert_ok;

fn request(description: &str) -> CreateBackupRequest {
    CreateBackupRequest {
        description: description.to_string(),
        ..CreateBackupRequest::default()
    }
}

fn small_store() -> FakeStore {
    FakeStore::new()
        .with_table("a", named_rows("a", 2))
        .with_table("b", named_rows("b", 3))
}

#[tokio::test]
async fn test_create_backup_applies_configured_defaults() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();

    let record = service.create_backup(request(descriptions::NIGHTLY)).await.unwrap();
    assert!(!record.compressed, "Settings disable compression by default");
    assert_eq!(record.verified, VerificationStatus::Passed);

    let record = service
        .create_backup(CreateBackupRequest {
            compress: Some(true),
            verify: Some(false),
            ..request(descriptions::NIGHTLY)
        })
        .await
        .unwrap();
    assert!(record.compressed);
    assert_eq!(record.verified, VerificationStatus::Unknown);
}

#[tokio::test]
async fn test_blank_description_is_invalid() {
    let env = TestEnv::new(small_store()).await;
    let err = env.service().create_backup(request("   ")).await.unwrap_err();
    assert!(matches!(err, BackupError::InvalidRequest { .. }));
    assert!(env.catalog.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_busy_backup_cannot_be_deleted() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();
    let record = service.create_backup(request(descriptions::NIGHTLY)).await.unwrap();

    service
        .operation_tracker()
        .try_start_operation(&record.id, "restore")
        .await
        .unwrap();

    let err = service.delete_backup(&record.id).await.unwrap_err();
    assert!(matches!(err, BackupError::Busy { .. }), "got: {}", err);
    assert_ok!(service.get_backup_info(&record.id).await);

    let err = service
        .restore(&record.id, RestoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::Busy { .. }));

    service.operation_tracker().finish_operation(&record.id).await;
    assert_ok!(service.delete_backup(&record.id).await);
    assert!(service.get_backup_info(&record.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_restore_releases_busy_flag() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();
    let record = service.create_backup(request(descriptions::NIGHTLY)).await.unwrap();

    let result = service
        .restore(&record.id, RestoreOptions::default())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(service.operation_status().await.total_active, 0);

    // Failed restores release it too
    assert!(service
        .restore_specific_tables(&record.id, &["missing".to_string()])
        .await
        .is_err());
    assert!(!service.operation_tracker().is_busy(&record.id).await);
}

#[tokio::test]
async fn test_cleanup_keeps_most_recent_backups() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();

    let mut ids = Vec::new();
    for i in 0..4 {
        let record = service
            .create_backup(request(&format!("backup {}", i)))
            .await
            .unwrap();
        ids.push(record.id);
    }

    let report = service.cleanup_old_backups(2).await.unwrap();

    assert_eq!(report.deleted, vec![ids[1].clone(), ids[0].clone()]);
    assert!(report.skipped_busy.is_empty());
    let remaining: Vec<String> = service
        .list_backups()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![ids[3].clone(), ids[2].clone()]);
    assert_eq!(env.backup_files().len(), 2);
}

#[tokio::test]
async fn test_cleanup_skips_busy_backups() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();

    let oldest = service.create_backup(request("old")).await.unwrap();
    service.create_backup(request("new")).await.unwrap();
    service
        .operation_tracker()
        .try_start_operation(&oldest.id, "restore")
        .await
        .unwrap();

    let report = service.cleanup_old_backups(1).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.skipped_busy, vec![oldest.id.clone()]);
    assert_eq!(service.list_backups().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cleanup_rejects_zero_retention() {
    let env = TestEnv::new(small_store()).await;
    let err = env.service().cleanup_old_backups(0).await.unwrap_err();
    assert!(matches!(err, BackupError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_stale_temp_files_are_removed() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();
    let record = service.create_backup(request(descriptions::NIGHTLY)).await.unwrap();

    std::fs::write(env.backup_dir().join("backup_crashed.snap.tmp"), b"SNAPSHOT 1").unwrap();
    std::fs::write(env.backup_dir().join("backup_crashed2.snap.zst.tmp"), b"").unwrap();

    let removed = service.cleanup_stale_temp_files().unwrap();

    assert_eq!(removed, 2);
    assert_eq!(env.backup_files().len(), 1);
    assert!(std::path::Path::new(&record.file_path).exists());
}

#[tokio::test]
async fn test_stale_cleanup_on_missing_directory() {
    let env = TestEnv::new(small_store()).await;
    assert_eq!(env.service().cleanup_stale_temp_files().unwrap(), 0);
}

#[tokio::test]
async fn test_scheduled_run_creates_backup_and_applies_retention() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();

    run_scheduled_backup(&service, Some(2)).await;
    run_scheduled_backup(&service, Some(2)).await;
    run_scheduled_backup(&service, Some(2)).await;

    let backups = service.list_backups().await.unwrap();
    assert_eq!(backups.len(), 2);
    assert!(backups.iter().all(|b| b.description == SCHEDULED_DESCRIPTION));

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_backups, 2);
    assert_eq!(stats.verified_passed, 2);
}

#[tokio::test]
async fn test_recovery_options_and_test_restore() {
    let env = TestEnv::new(small_store()).await;
    let service = env.service();
    let record = service.create_backup(request(descriptions::NIGHTLY)).await.unwrap();

    let manifest = service.get_recovery_options(&record.id).await.unwrap();
    assert_eq!(manifest.total_rows(), 5);

    let report = service.test_restore(&record.id).await.unwrap();
    assert!(report.valid);
    assert!(env.store.written_tables().is_empty());
}
