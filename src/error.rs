//! Error types for sqlkit.
//!
//! All failures surface as a single `DbError` enum built with `thiserror`.
//! Every variant carries a specific, stable message naming the violated
//! precondition, so callers can match on the variant and users can read
//! the message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The underlying driver could not establish or use the connection.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// The driver rejected a statement during execution.
    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g. "42S02" for an unknown table
        sql_state: Option<String>,
    },

    /// A malformed request was rejected before touching the driver.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A connection address could not be dissected.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The operation is not available for the active driver or host.
    #[error("Unsupported operation: {operation} - {reason}")]
    Unsupported { operation: String, reason: String },

    /// Filesystem or subprocess I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQLSTATE.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// SQLSTATE reported by the driver, when the failure came from one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => {
                DbError::connection("Timed out acquiring a connection from the pool")
            }
            sqlx::Error::PoolClosed => DbError::connection("Connection pool is closed"),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::database(
                format!("Column index {} out of bounds (len: {})", index, len),
                None,
            ),
            sqlx::Error::ColumnDecode { index, source } => DbError::database(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                DbError::database(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => DbError::connection("Database worker crashed"),
            _ => DbError::database(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for sqlkit operations.
pub type DbResult<T> = Result<T, DbError>;
