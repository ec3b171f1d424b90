//! MySQL-backed integration tests.
//!
//! These need a live, disposable MySQL server plus the `mysqldump`, `mysql`,
//! `gzip` and `zcat` binaries, so they are `#[ignore]`d by default. Point the
//! environment at a server and run them explicitly:
//!
//! ```text
//! SQLKIT_TEST_MYSQL_DSN='mysql:dbname=sqlkit_test;host=127.0.0.1' \
//! SQLKIT_TEST_MYSQL_USER=root \
//! SQLKIT_TEST_MYSQL_PASSWORD=secret \
//! cargo test --test mysql_test -- --ignored
//! ```
//!
//! The database named in the address must already exist; the tests create and
//! drop their own tables and databases inside it.

use sqlkit::{Bindings, Connection, Credentials, Dsn, Param};

async fn connect_from_env() -> Connection {
    let raw = std::env::var("SQLKIT_TEST_MYSQL_DSN")
        .expect("SQLKIT_TEST_MYSQL_DSN must point at a disposable MySQL server");
    let dsn = Dsn::parse(&raw).unwrap();
    let credentials = Credentials::new(
        std::env::var("SQLKIT_TEST_MYSQL_USER").ok(),
        std::env::var("SQLKIT_TEST_MYSQL_PASSWORD").ok(),
    );
    Connection::connect(dsn, credentials).await.unwrap()
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn test_create_database_provisions_once_then_skips() {
    let conn = connect_from_env().await;
    let name = format!("sqlkit_it_{}", std::process::id());
    let principal = format!("{}_user", name);

    let created = conn
        .catalog()
        .create_database(&name, &principal, "s3cret pw!")
        .await
        .unwrap();
    assert!(created);
    assert!(
        conn.catalog()
            .list_databases()
            .await
            .unwrap()
            .contains(&name)
    );

    // Second call sees the existing database and changes nothing
    let created_again = conn
        .catalog()
        .create_database(&name, &principal, "s3cret pw!")
        .await
        .unwrap();
    assert!(!created_again);

    conn.execute(&format!("DROP DATABASE `{}`", name), Bindings::None)
        .await
        .unwrap();
    conn.execute(&format!("DROP USER '{}'@'%'", principal), Bindings::None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "needs a live MySQL server and the dump binaries"]
async fn test_export_import_round_trip_restores_rows() {
    let conn = connect_from_env().await;

    conn.execute("DROP TABLE IF EXISTS roundtrip", Bindings::None)
        .await
        .unwrap();
    conn.execute(
        "CREATE TABLE roundtrip (id INT PRIMARY KEY, label VARCHAR(32))",
        Bindings::None,
    )
    .await
    .unwrap();
    conn.execute_batch(
        "INSERT INTO roundtrip (id, label) VALUES (?, ?)",
        &[
            vec![Param::Int(1), Param::from("ada")],
            vec![Param::Int(2), Param::from("lin")],
        ],
    )
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let archive = conn.export(dir.path()).await.unwrap();
    assert!(archive.to_string_lossy().ends_with(".sql.gz"));

    // Mutate, then restore from the archive
    conn.execute("DELETE FROM roundtrip WHERE id = 2", Bindings::None)
        .await
        .unwrap();
    conn.import(&archive, false).await.unwrap();

    let total = conn
        .cell("SELECT COUNT(*) FROM roundtrip", Bindings::None)
        .await
        .unwrap();
    assert_eq!(total.as_deref(), Some("2"));

    conn.execute("DROP TABLE roundtrip", Bindings::None)
        .await
        .unwrap();
}
