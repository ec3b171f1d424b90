//! Connection configuration: DSN parsing, credentials, and session options.
//!
//! Addresses use the `scheme:key=value;...` form, e.g.
//! `mysql:dbname=app;host=127.0.0.1;port=3306` or `sqlite:/var/lib/app.db`.
//! A `Dsn` is parsed once at construction and never mutated afterwards.

use crate::error::{DbError, DbResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Filename used by [`Dsn::sqlite_scratch`].
pub const SCRATCH_DB_FILENAME: &str = "sqlkit-scratch.db";

/// Maximum length accepted for database/user identifiers in DDL.
pub const MAX_IDENTIFIER_LEN: usize = 64;

// Pool defaults. The facade models a single synchronous handle, so the pool
// holds exactly one connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 1;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

fn dbname_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"dbname=(\w+)").expect("dbname pattern is valid"))
}

/// Supported driver kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Networked relational engine (includes MariaDB).
    MySql,
    /// Embedded file-backed engine.
    Sqlite,
}

impl DriverKind {
    /// Driver name as reported in the attribute snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A parsed connection address.
///
/// Immutable after construction; [`Dsn::database_name`] inspects but never
/// rewrites the raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    raw: String,
    kind: DriverKind,
    /// `key=value` pairs after the scheme, in source order. Empty for SQLite.
    params: Vec<(String, String)>,
    /// Path (or `:memory:`) for SQLite addresses.
    sqlite_path: Option<String>,
}

impl Dsn {
    /// Parse an address string.
    pub fn parse(raw: impl Into<String>) -> DbResult<Self> {
        let raw = raw.into();
        if let Some(rest) = raw.strip_prefix("mysql:") {
            let params = rest
                .split(';')
                .filter(|part| !part.is_empty())
                .map(|part| match part.split_once('=') {
                    Some((k, v)) => Ok((k.trim().to_string(), v.trim().to_string())),
                    None => Err(DbError::parse(format!(
                        "expected key=value in connection address, got '{}'",
                        part
                    ))),
                })
                .collect::<DbResult<Vec<_>>>()?;
            Ok(Self {
                raw,
                kind: DriverKind::MySql,
                params,
                sqlite_path: None,
            })
        } else if let Some(path) = raw.strip_prefix("sqlite:") {
            if path.is_empty() {
                return Err(DbError::parse("sqlite address is missing a file path"));
            }
            Ok(Self {
                sqlite_path: Some(path.to_string()),
                raw,
                kind: DriverKind::Sqlite,
                params: Vec::new(),
            })
        } else {
            Err(DbError::parse(format!(
                "unknown driver scheme in connection address '{}'",
                raw
            )))
        }
    }

    /// Build an explicitly-scoped scratch database address inside `dir`.
    ///
    /// This replaces the reference behavior of defaulting to a process-wide
    /// file in the system temp directory; the caller must name the directory.
    pub fn sqlite_scratch(dir: &Path) -> DbResult<Self> {
        let path = dir.join(SCRATCH_DB_FILENAME);
        let path = path
            .to_str()
            .ok_or_else(|| DbError::parse("scratch directory path is not valid UTF-8"))?;
        Self::parse(format!("sqlite:{}", path))
    }

    /// The raw address string as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Driver kind detected from the scheme.
    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    /// Value of a `key=value` parameter, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Host parameter, defaulting to loopback.
    pub fn host(&self) -> &str {
        self.param("host").unwrap_or("127.0.0.1")
    }

    /// Port parameter, when present and numeric.
    pub fn port(&self) -> Option<u16> {
        self.param("port").and_then(|p| p.parse().ok())
    }

    /// File path for SQLite addresses.
    pub fn sqlite_path(&self) -> Option<&str> {
        self.sqlite_path.as_deref()
    }

    /// Extract the database name from the address.
    ///
    /// The capture is word characters only (`dbname=(\w+)`), so quoting or
    /// punctuation never leaks into downstream statements or command lines.
    pub fn database_name(&self) -> DbResult<String> {
        dbname_pattern()
            .captures(&self.raw)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| {
                DbError::parse("could not match database name from connection address")
            })
    }
}

/// Connection credentials. The password never appears in `Debug` output.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<Option<String>>,
        password: impl Into<Option<String>>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// How execution failures are reported. Only `Raise` changes control flow in
/// this crate (everything returns `Result`); the mode is surfaced through the
/// attribute snapshot for parity with the wrapped drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    Raise,
    Silent,
}

/// Key shape for fetched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchShape {
    /// Rows keyed by column name.
    Assoc,
    /// Rows keyed by zero-based column position, rendered as decimal strings
    /// (`"0"`, `"1"`, ...).
    Indexed,
}

/// Per-connection option set.
///
/// Caller-supplied overrides are merged field-by-field over the built-in
/// defaults: raise on error, associative rows, server-side prepares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub error_mode: ErrorMode,
    pub fetch_shape: FetchShape,
    /// When true, parameterized statements use the driver's prepared
    /// statement cache instead of per-call preparation.
    pub server_side_prepare: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Raise,
            fetch_shape: FetchShape::Assoc,
            server_side_prepare: true,
        }
    }
}

/// Partial option set for merging over [`SessionOptions::default`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    pub error_mode: Option<ErrorMode>,
    pub fetch_shape: Option<FetchShape>,
    pub server_side_prepare: Option<bool>,
}

impl SessionOptions {
    /// Merge caller overrides over the defaults; supplied entries win.
    pub fn merged(overrides: SessionOverrides) -> Self {
        let defaults = Self::default();
        Self {
            error_mode: overrides.error_mode.unwrap_or(defaults.error_mode),
            fetch_shape: overrides.fetch_shape.unwrap_or(defaults.fetch_shape),
            server_side_prepare: overrides
                .server_side_prepare
                .unwrap_or(defaults.server_side_prepare),
        }
    }
}

/// Validate a name used as a SQL identifier in DDL (database, user).
///
/// MySQL DDL does not accept parameter markers, so anything interpolated into
/// `CREATE DATABASE`/`CREATE USER`/`GRANT` must pass this allow-list first.
pub fn validate_identifier(kind: &str, name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::invalid_request(format!("{} cannot be empty", kind)));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::invalid_request(format!(
            "{} exceeds {} characters",
            kind, MAX_IDENTIFIER_LEN
        )));
    }
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::invalid_request(format!(
            "{} '{}' contains characters outside [A-Za-z0-9_]",
            kind, name
        )));
    }
    Ok(())
}
