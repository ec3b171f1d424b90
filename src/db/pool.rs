//! Driver pool handling.
//!
//! `DbPool` wraps the concrete sqlx pool for the active driver. The pool is
//! capped at a single connection so the facade behaves like one synchronous
//! handle; callers wanting concurrency open one facade per user.

use crate::config::{
    Credentials, DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, DriverKind, Dsn,
};
use crate::error::{DbError, DbResult};
use sqlx::{
    MySqlPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Get the driver kind for this pool.
    pub fn driver(&self) -> DriverKind {
        match self {
            DbPool::MySql(_) => DriverKind::MySql,
            DbPool::Sqlite(_) => DriverKind::Sqlite,
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Server version reported by the engine, if it answers.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

/// Open a pool for the given address and credentials.
pub(crate) async fn open_pool(dsn: &Dsn, credentials: &Credentials) -> DbResult<DbPool> {
    let acquire_timeout = Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS);

    info!(driver = %dsn.kind(), "Connecting to database");

    match dsn.kind() {
        DriverKind::MySql => {
            let mut options = MySqlConnectOptions::new()
                .host(dsn.host())
                .charset("utf8mb4");
            if let Some(port) = dsn.port() {
                options = options.port(port);
            }
            if let Ok(database) = dsn.database_name() {
                options = options.database(&database);
            }
            if let Some(username) = credentials.username.as_deref() {
                options = options.username(username);
            }
            if let Some(password) = credentials.password.as_deref() {
                options = options.password(password);
            }

            let pool = MySqlPoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .acquire_timeout(acquire_timeout)
                .connect_with(options)
                .await
                .map_err(|e| connection_error(DriverKind::MySql, &e))?;
            Ok(DbPool::MySql(pool))
        }
        DriverKind::Sqlite => {
            let options = SqliteConnectOptions::from_str(dsn.as_str())
                .map_err(|e| {
                    DbError::connection(format!("Invalid SQLite address: {}", e))
                })?
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .acquire_timeout(acquire_timeout)
                .connect_with(options)
                .await
                .map_err(|e| connection_error(DriverKind::Sqlite, &e))?;
            Ok(DbPool::Sqlite(pool))
        }
    }
}

/// Shape a driver connect failure into a message naming the likely cause.
fn connection_error(driver: DriverKind, error: &sqlx::Error) -> DbError {
    let error_str = error.to_string().to_lowercase();

    let hint = if error_str.contains("connection refused") {
        format!("check that the {} server is running and accessible", driver)
    } else if error_str.contains("authentication") || error_str.contains("password") {
        "verify the username and password".to_string()
    } else if error_str.contains("does not exist") || error_str.contains("unknown database") {
        "check that the database name exists".to_string()
    } else {
        match driver {
            DriverKind::MySql => {
                "verify the address format: mysql:dbname=db;host=host;port=3306".to_string()
            }
            DriverKind::Sqlite => {
                "verify the file path is accessible: sqlite:path/to/db.sqlite".to_string()
            }
        }
    };

    DbError::connection(format!("{} ({})", error, hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_sqlite_memory_pool() {
        let dsn = Dsn::parse("sqlite::memory:").unwrap();
        let pool = open_pool(&dsn, &Credentials::default()).await.unwrap();
        assert_eq!(pool.driver(), DriverKind::Sqlite);
        assert!(pool.server_version().await.is_some());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_open_sqlite_missing_parent_dir_fails() {
        let dsn = Dsn::parse("sqlite:/nonexistent-dir-sqlkit/xyz/app.db").unwrap();
        let result = open_pool(&dsn, &Credentials::default()).await;
        assert!(matches!(result, Err(DbError::Connection { .. })));
    }

    #[test]
    fn test_connection_error_mentions_driver_hint() {
        let err = connection_error(
            DriverKind::MySql,
            &sqlx::Error::PoolTimedOut,
        );
        assert!(err.to_string().contains("mysql:dbname="));
    }
}
