//! The connection facade.
//!
//! `Connection` owns the driver pool plus the parsed address, credentials and
//! merged session options, and exposes the helper operations: `execute`,
//! `execute_batch`, the `all`/`row`/`cell` readers and the attribute
//! snapshot. Backup and restore live in [`crate::db::dump`] and are re-exposed
//! here as methods.
//!
//! Execution dispatch is three-way:
//! - no bindings: the statement runs directly, no parameter substitution;
//! - one parameter set: prepared once, executed once;
//! - a list of parameter sets: batch execution returning a summed row count.

use crate::config::{Credentials, DriverKind, Dsn, FetchShape, SessionOptions, SessionOverrides};
use crate::db::dump;
use crate::db::params::Param;
use crate::db::pool::{DbPool, open_pool};
use crate::db::types::RowMap;
use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed attribute names reported by [`Connection::attributes`], in snapshot
/// order.
pub const ATTRIBUTE_NAMES: [&str; 13] = [
    "autocommit",
    "case",
    "client_version",
    "connection_status",
    "driver_name",
    "errmode",
    "fetch_shape",
    "oracle_nulls",
    "persistent",
    "prefetch",
    "server_info",
    "server_version",
    "timeout",
];

/// Parameter bindings for one `execute` call.
#[derive(Debug, Clone, Default)]
pub enum Bindings {
    /// No parameter substitution; the statement runs as-is.
    #[default]
    None,
    /// One parameter set: prepare once, execute once.
    Row(Vec<Param>),
    /// A sequence of parameter sets: prepare once, execute per set.
    Batch(Vec<Vec<Param>>),
}

impl From<Vec<Param>> for Bindings {
    fn from(row: Vec<Param>) -> Self {
        Self::Row(row)
    }
}

impl From<Vec<Vec<Param>>> for Bindings {
    fn from(batch: Vec<Vec<Param>>) -> Self {
        Self::Batch(batch)
    }
}

/// Result of one `execute` call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Fetched rows, for the no-bindings and single-set forms.
    Rows(Vec<RowMap>),
    /// Summed affected-row count, for the batch form.
    Affected(u64),
}

impl Outcome {
    /// Rows when this outcome carries them.
    pub fn into_rows(self) -> Option<Vec<RowMap>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    /// Affected-row count when this outcome carries one.
    pub fn affected(&self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected(n) => Some(*n),
        }
    }
}

/// A live database connection with helper operations.
pub struct Connection {
    pool: DbPool,
    dsn: Dsn,
    credentials: Credentials,
    options: SessionOptions,
}

impl Connection {
    /// Connect with default session options.
    pub async fn connect(dsn: Dsn, credentials: Credentials) -> DbResult<Self> {
        Self::connect_with(dsn, credentials, SessionOverrides::default()).await
    }

    /// Connect, merging the supplied option overrides over the defaults.
    pub async fn connect_with(
        dsn: Dsn,
        credentials: Credentials,
        overrides: SessionOverrides,
    ) -> DbResult<Self> {
        let options = SessionOptions::merged(overrides);
        let pool = open_pool(&dsn, &credentials).await?;
        Ok(Self {
            pool,
            dsn,
            credentials,
            options,
        })
    }

    /// The parsed connection address.
    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// The active driver kind.
    pub fn driver(&self) -> DriverKind {
        self.pool.driver()
    }

    /// The merged session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Execute a statement with the given bindings.
    ///
    /// Returns [`Outcome::Rows`] for the no-bindings and single-set forms and
    /// [`Outcome::Affected`] for batch bindings.
    pub async fn execute(&self, sql: &str, bindings: Bindings) -> DbResult<Outcome> {
        require_statement(sql)?;

        match bindings {
            Bindings::None => {
                debug!(sql = %sql, "Executing statement");
                let rows = self.fetch_rows(sql, &[]).await?;
                Ok(Outcome::Rows(rows))
            }
            Bindings::Row(params) => {
                debug!(sql = %sql, params = params.len(), "Executing prepared statement");
                let rows = self.fetch_rows(sql, &params).await?;
                Ok(Outcome::Rows(rows))
            }
            Bindings::Batch(sets) => {
                let total = self.execute_batch(sql, &sets).await?;
                Ok(Outcome::Affected(total))
            }
        }
    }

    /// Execute one statement once per parameter set, in order.
    ///
    /// Returns the summed affected-row count. The first driver failure aborts
    /// the call; parameter sets already applied stay applied, transaction
    /// wrapping is the caller's responsibility.
    pub async fn execute_batch(&self, sql: &str, sets: &[Vec<Param>]) -> DbResult<u64> {
        require_statement(sql)?;
        if sets.is_empty() {
            return Err(DbError::invalid_request(
                "batch bindings must contain at least one parameter set",
            ));
        }

        debug!(sql = %sql, sets = sets.len(), "Executing batch");

        let persistent = self.options.server_side_prepare;
        let mut total = 0u64;
        for set in sets {
            total += match &self.pool {
                DbPool::MySql(pool) => mysql::execute_write(pool, sql, set, persistent).await?,
                DbPool::Sqlite(pool) => sqlite::execute_write(pool, sql, set, persistent).await?,
            };
        }
        Ok(total)
    }

    /// Every row of the result set, as column-keyed mappings.
    pub async fn all(&self, sql: &str, bindings: Bindings) -> DbResult<Vec<RowMap>> {
        match self.execute(sql, bindings).await? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Err(DbError::invalid_request(
                "batch bindings return an affected-row count; use execute_batch",
            )),
        }
    }

    /// First row of the result set, if any.
    pub async fn row(&self, sql: &str, bindings: Bindings) -> DbResult<Option<RowMap>> {
        let rows = self.all(sql, bindings).await?;
        Ok(rows.into_iter().next())
    }

    /// First column of the first row, rendered as a string.
    ///
    /// Reads the leading column of the driver row, not the fetched map, so
    /// "first" means statement order rather than key order.
    pub async fn cell(&self, sql: &str, bindings: Bindings) -> DbResult<Option<String>> {
        require_statement(sql)?;
        let params = match bindings {
            Bindings::None => Vec::new(),
            Bindings::Row(params) => params,
            Bindings::Batch(_) => {
                return Err(DbError::invalid_request(
                    "batch bindings return an affected-row count; use execute_batch",
                ));
            }
        };

        debug!(sql = %sql, "Fetching scalar");
        let persistent = self.options.server_side_prepare;
        match &self.pool {
            DbPool::MySql(pool) => mysql::fetch_cell(pool, sql, &params, persistent).await,
            DbPool::Sqlite(pool) => sqlite::fetch_cell(pool, sql, &params, persistent).await,
        }
    }

    /// Snapshot of every attribute in [`ATTRIBUTE_NAMES`].
    ///
    /// Attributes the driver does not support are reported as `null`; a
    /// per-attribute failure never fails the snapshot.
    pub async fn attributes(&self) -> RowMap {
        let mut snapshot = RowMap::new();
        for name in ATTRIBUTE_NAMES {
            snapshot.insert(name.to_string(), self.attribute_value(name).await);
        }
        snapshot
    }

    /// One named attribute. Unknown names are rejected rather than silently
    /// returning the whole snapshot.
    pub async fn attribute(&self, name: &str) -> DbResult<JsonValue> {
        if !ATTRIBUTE_NAMES.contains(&name) {
            return Err(DbError::invalid_request(format!(
                "unknown attribute '{}'",
                name
            )));
        }
        Ok(self.attribute_value(name).await)
    }

    async fn attribute_value(&self, name: &str) -> JsonValue {
        match name {
            "autocommit" => JsonValue::Bool(true),
            "case" => JsonValue::String("natural".to_string()),
            "connection_status" => {
                let closed = match &self.pool {
                    DbPool::MySql(pool) => pool.is_closed(),
                    DbPool::Sqlite(pool) => pool.is_closed(),
                };
                JsonValue::String(if closed { "Closed" } else { "Connected" }.to_string())
            }
            "driver_name" => JsonValue::String(self.driver().name().to_string()),
            "errmode" => JsonValue::String(
                match self.options.error_mode {
                    crate::config::ErrorMode::Raise => "raise",
                    crate::config::ErrorMode::Silent => "silent",
                }
                .to_string(),
            ),
            "fetch_shape" => JsonValue::String(
                match self.options.fetch_shape {
                    crate::config::FetchShape::Assoc => "assoc",
                    crate::config::FetchShape::Indexed => "indexed",
                }
                .to_string(),
            ),
            "oracle_nulls" => JsonValue::String("natural".to_string()),
            "persistent" => JsonValue::Bool(false),
            "server_info" => match &self.pool {
                DbPool::MySql(pool) => {
                    sqlx::query_scalar::<_, String>("SELECT @@version_comment")
                        .fetch_one(pool)
                        .await
                        .map(JsonValue::String)
                        .unwrap_or(JsonValue::Null)
                }
                DbPool::Sqlite(_) => JsonValue::Null,
            },
            "server_version" => self
                .pool
                .server_version()
                .await
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
            // client_version, prefetch, timeout: not exposed by the driver
            _ => JsonValue::Null,
        }
    }

    /// Dump the current database into a timestamped `.sql.gz` archive under
    /// `destination`, returning the archive path. MySQL only; blocks until
    /// the dump pipeline has exited cleanly.
    pub async fn export(&self, destination: &Path) -> DbResult<PathBuf> {
        dump::export(self, destination).await
    }

    /// Restore the current database from a `.sql.gz` archive. When `backup`
    /// is true, exports into the archive's directory first.
    pub async fn import(&self, source: &Path, backup: bool) -> DbResult<()> {
        dump::import(self, source, backup).await
    }

    async fn fetch_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RowMap>> {
        let persistent = self.options.server_side_prepare;
        let shape = self.options.fetch_shape;
        match &self.pool {
            DbPool::MySql(pool) => mysql::fetch_rows(pool, sql, params, persistent, shape).await,
            DbPool::Sqlite(pool) => sqlite::fetch_rows(pool, sql, params, persistent, shape).await,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn require_statement(sql: &str) -> DbResult<()> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_request("statement cannot be empty"));
    }
    Ok(())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// The two modules below provide the same interface adapted to their driver.
// The bodies are intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use crate::db::types::ToRowMap;
    use futures_util::TryStreamExt;
    use sqlx::MySqlPool;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        params: &[Param],
        persistent: bool,
        shape: FetchShape,
    ) -> DbResult<Vec<RowMap>> {
        let mut rows = Vec::new();
        // When params is empty, run the raw SQL to avoid prepared statement
        // restrictions on DDL
        if params.is_empty() {
            use sqlx::Executor;
            let mut stream = pool.fetch(sql);
            while let Some(row) = stream.try_next().await.map_err(DbError::from)? {
                rows.push(row.to_row_map(shape));
            }
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let mut stream = query.persistent(persistent).fetch(pool);
            while let Some(row) = stream.try_next().await.map_err(DbError::from)? {
                rows.push(row.to_row_map(shape));
            }
        }
        Ok(rows)
    }

    pub async fn fetch_cell(
        pool: &MySqlPool,
        sql: &str,
        params: &[Param],
        persistent: bool,
    ) -> DbResult<Option<String>> {
        if params.is_empty() {
            use sqlx::Executor;
            let mut stream = pool.fetch(sql);
            let row = stream.try_next().await.map_err(DbError::from)?;
            Ok(row.and_then(|row| row.first_cell()))
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let mut stream = query.persistent(persistent).fetch(pool);
            let row = stream.try_next().await.map_err(DbError::from)?;
            Ok(row.and_then(|row| row.first_cell()))
        }
    }

    pub async fn execute_write(
        pool: &MySqlPool,
        sql: &str,
        params: &[Param],
        persistent: bool,
    ) -> DbResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let result = query.persistent(persistent).execute(pool).await?;
        Ok(result.rows_affected())
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use crate::db::types::ToRowMap;
    use futures_util::TryStreamExt;
    use sqlx::SqlitePool;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        params: &[Param],
        persistent: bool,
        shape: FetchShape,
    ) -> DbResult<Vec<RowMap>> {
        let mut rows = Vec::new();
        if params.is_empty() {
            use sqlx::Executor;
            let mut stream = pool.fetch(sql);
            while let Some(row) = stream.try_next().await.map_err(DbError::from)? {
                rows.push(row.to_row_map(shape));
            }
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let mut stream = query.persistent(persistent).fetch(pool);
            while let Some(row) = stream.try_next().await.map_err(DbError::from)? {
                rows.push(row.to_row_map(shape));
            }
        }
        Ok(rows)
    }

    pub async fn fetch_cell(
        pool: &SqlitePool,
        sql: &str,
        params: &[Param],
        persistent: bool,
    ) -> DbResult<Option<String>> {
        if params.is_empty() {
            use sqlx::Executor;
            let mut stream = pool.fetch(sql);
            let row = stream.try_next().await.map_err(DbError::from)?;
            Ok(row.and_then(|row| row.first_cell()))
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let mut stream = query.persistent(persistent).fetch(pool);
            let row = stream.try_next().await.map_err(DbError::from)?;
            Ok(row.and_then(|row| row.first_cell()))
        }
    }

    pub async fn execute_write(
        pool: &SqlitePool,
        sql: &str,
        params: &[Param],
        persistent: bool,
    ) -> DbResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let result = query.persistent(persistent).execute(pool).await?;
        Ok(result.rows_affected())
    }
}
