//! sqlkit
//!
//! A thin convenience layer over sqlx for MySQL and SQLite: a connection
//! facade with execute/fetch helpers and batch execution, catalog
//! introspection and provisioning, and dump/restore orchestration over
//! external tools.
//!
//! ```no_run
//! use sqlkit::{Connection, Credentials, Dsn, Param};
//!
//! # async fn demo() -> sqlkit::DbResult<()> {
//! let dsn = Dsn::parse("mysql:dbname=app;host=127.0.0.1")?;
//! let conn = Connection::connect(dsn, Credentials::default()).await?;
//!
//! let users = conn
//!     .all(
//!         "SELECT id, name FROM users WHERE active = ?",
//!         vec![Param::Bool(true)].into(),
//!     )
//!     .await?;
//!
//! let inserted = conn
//!     .execute_batch(
//!         "INSERT INTO users (name) VALUES (?)",
//!         &[vec!["ada".into()], vec!["lin".into()], vec!["mo".into()]],
//!     )
//!     .await?;
//! assert_eq!(inserted, 3);
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;

pub use config::{
    Credentials, DriverKind, Dsn, ErrorMode, FetchShape, SessionOptions, SessionOverrides,
};
pub use db::{ATTRIBUTE_NAMES, Bindings, Catalog, Connection, DbPool, Outcome, Param, RowMap};
pub use error::{DbError, DbResult};
