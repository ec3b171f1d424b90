//! Integration tests for the catalog helper on SQLite.
//!
//! Provisioning (`create_database`) needs a MySQL server and is covered by
//! unit tests on identifier validation plus the driver guard asserted here.

use sqlkit::{Bindings, Connection, Credentials, DbError, Dsn};
use tempfile::TempDir;

async fn setup() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let dsn = Dsn::sqlite_scratch(dir.path()).unwrap();
    let conn = Connection::connect(dsn, Credentials::default())
        .await
        .unwrap();
    (dir, conn)
}

#[tokio::test]
async fn test_list_databases_reports_main() {
    let (_dir, conn) = setup().await;

    let databases = conn.catalog().list_databases().await.unwrap();
    assert!(
        databases.contains(&"main".to_string()),
        "expected 'main' in {:?}",
        databases
    );
}

#[tokio::test]
async fn test_list_tables_enumerates_everything() {
    let (_dir, conn) = setup().await;

    conn.execute("CREATE TABLE beta (id INTEGER)", Bindings::None)
        .await
        .unwrap();
    conn.execute("CREATE TABLE alpha (id INTEGER)", Bindings::None)
        .await
        .unwrap();

    let tables = conn.catalog().list_tables().await.unwrap();
    assert_eq!(tables, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn test_list_tables_empty_database() {
    let (_dir, conn) = setup().await;

    let tables = conn.catalog().list_tables().await.unwrap();
    assert!(tables.is_empty());
}

#[tokio::test]
async fn test_create_database_requires_mysql() {
    let (_dir, conn) = setup().await;

    let err = conn
        .catalog()
        .create_database("newdb", "svc", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));
    assert!(err.to_string().contains("create_database"));
}

#[tokio::test]
async fn test_create_database_guard_fires_before_identifier_checks() {
    let (_dir, conn) = setup().await;

    // The driver guard comes first, so a hostile name never reaches SQL
    let err = conn
        .catalog()
        .create_database("x`; DROP DATABASE y", "svc", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));
}
