//! Catalog helper: metadata and provisioning operations on a connection.
//!
//! Listings always consume their cursor to exhaustion, so a database or table
//! literally named as an empty string still shows up instead of truncating
//! the result.

use crate::config::validate_identifier;
use crate::db::facade::Connection;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use sqlx::Row;
use tracing::{debug, info};

mod queries {
    pub mod mysql {
        pub const LIST_DATABASES: &str = "SHOW DATABASES";
        pub const LIST_TABLES: &str = "SHOW TABLES";
    }

    pub mod sqlite {
        pub const LIST_DATABASES: &str = "PRAGMA database_list";
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

/// Metadata and provisioning operations layered on a [`Connection`].
pub struct Catalog<'a> {
    conn: &'a Connection,
}

impl Connection {
    /// Catalog operations for this connection.
    pub fn catalog(&self) -> Catalog<'_> {
        Catalog { conn: self }
    }
}

impl Catalog<'_> {
    /// Names of every database visible to the connection, in listing order.
    pub async fn list_databases(&self) -> DbResult<Vec<String>> {
        let names = match self.conn.pool() {
            DbPool::MySql(pool) => {
                let rows = sqlx::query(queries::mysql::LIST_DATABASES)
                    .fetch_all(pool)
                    .await?;
                rows.iter()
                    .filter_map(|row| get_string_by_index(row, 0))
                    .collect::<Vec<_>>()
            }
            DbPool::Sqlite(pool) => {
                let rows = sqlx::query(queries::sqlite::LIST_DATABASES)
                    .fetch_all(pool)
                    .await?;
                rows.iter()
                    .filter_map(|row| row.try_get::<String, _>("name").ok())
                    .collect::<Vec<_>>()
            }
        };
        debug!(count = names.len(), "Listed databases");
        Ok(names)
    }

    /// Names of every table in the current database, in listing order.
    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let names = match self.conn.pool() {
            DbPool::MySql(pool) => {
                let rows = sqlx::query(queries::mysql::LIST_TABLES)
                    .fetch_all(pool)
                    .await?;
                rows.iter()
                    .filter_map(|row| get_string_by_index(row, 0))
                    .collect::<Vec<_>>()
            }
            DbPool::Sqlite(pool) => {
                let rows = sqlx::query(queries::sqlite::LIST_TABLES)
                    .fetch_all(pool)
                    .await?;
                rows.iter()
                    .filter_map(|row| row.try_get::<String, _>(0).ok())
                    .collect::<Vec<_>>()
            }
        };
        debug!(count = names.len(), "Listed tables");
        Ok(names)
    }

    /// Create a database plus a principal with full privileges on it.
    ///
    /// Returns `false` without side effects when the database already exists.
    /// MySQL DDL does not accept parameter markers, so `name` and `principal`
    /// must pass the strict identifier allow-list and the credential is
    /// embedded as an escaped single-quoted literal.
    pub async fn create_database(
        &self,
        name: &str,
        principal: &str,
        credential: &str,
    ) -> DbResult<bool> {
        let pool = match self.conn.pool() {
            DbPool::MySql(pool) => pool,
            DbPool::Sqlite(_) => {
                return Err(DbError::unsupported(
                    "create_database",
                    "requires the mysql driver",
                ));
            }
        };

        validate_identifier("database name", name)?;
        validate_identifier("principal", principal)?;

        if self.list_databases().await?.contains(&name.to_string()) {
            debug!(database = %name, "Database already exists, skipping create");
            return Ok(false);
        }

        let statements = [
            format!("CREATE DATABASE `{}`", name),
            format!(
                "CREATE USER '{}'@'%' IDENTIFIED BY '{}'",
                principal,
                escape_literal(credential)
            ),
            format!("GRANT ALL ON `{}`.* TO '{}'@'%'", name, principal),
            "FLUSH PRIVILEGES".to_string(),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| DbError::connection(format!("provisioning failed: {}", e)))?;
        }

        info!(database = %name, principal = %principal, "Created database and principal");
        Ok(true)
    }
}

/// Read a string column tolerating MySQL's bytes-typed text columns.
fn get_string_by_index(row: &sqlx::mysql::MySqlRow, index: usize) -> Option<String> {
    row.try_get::<String, _>(index).ok().or_else(|| {
        row.try_get::<Vec<u8>, _>(index)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}

/// Escape a value for embedding in a single-quoted MySQL string literal.
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal_quotes_and_backslashes() {
        assert_eq!(escape_literal("plain"), "plain");
        assert_eq!(escape_literal("o'brien"), "o\\'brien");
        assert_eq!(escape_literal(r"a\b"), r"a\\b");
        assert_eq!(escape_literal(r"'; DROP--"), r"\'; DROP--");
    }
}
