//! Integration tests for export/import preconditions.
//!
//! The happy path needs a live MySQL server plus mysqldump/gzip on the host,
//! so these tests pin down the guard behavior: every failed precondition is
//! fatal, and the driver check fires before any filesystem work.

use sqlkit::{Connection, Credentials, DbError, Dsn};
use tempfile::TempDir;

async fn setup_sqlite() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let dsn = Dsn::sqlite_scratch(dir.path()).unwrap();
    let conn = Connection::connect(dsn, Credentials::default())
        .await
        .unwrap();
    (dir, conn)
}

#[tokio::test]
async fn test_export_rejects_non_mysql_driver() {
    let (dir, conn) = setup_sqlite().await;

    let err = conn.export(dir.path()).await.unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));
    assert!(err.to_string().contains("export"));
    assert!(err.to_string().contains("mysql"));
}

#[tokio::test]
async fn test_import_rejects_non_mysql_driver() {
    let (dir, conn) = setup_sqlite().await;

    // Driver guard fires before the source-file check
    let missing = dir.path().join("nope.sql.gz");
    let err = conn.import(&missing, false).await.unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));
    assert!(err.to_string().contains("import"));
}

#[tokio::test]
async fn test_export_leaves_no_archive_behind_on_guard_failure() {
    let (dir, conn) = setup_sqlite().await;

    let _ = conn.export(dir.path()).await;
    let leftover: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".sql.gz"))
        .collect();
    assert!(leftover.is_empty());
}
