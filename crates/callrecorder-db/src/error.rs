//! Error types for the storage core.
//!
//! Failures come in two tiers. [`InitError`] aborts construction of a
//! [`Database`](crate::Database) and leaves nothing usable behind.
//! [`QueryError`] is returned by a single statement and leaves the handle
//! usable; its `Display` text is what [`Database::last_error`] reports.
//!
//! [`Database::last_error`]: crate::Database::last_error

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while opening a database.
#[derive(Debug, Error)]
pub enum InitError {
    /// The platform has no writable per-user data directory.
    #[error("Unable to resolve a writable data directory")]
    NoDataDir,

    /// The data directory did not exist and could not be created.
    #[error("Unable to make path: {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The database file could not be opened or created.
    #[error("Unable to open database: {}: {source}", .path.display())]
    Open {
        /// Database file path.
        path: PathBuf,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Connection settings could not be applied.
    #[error("Unable to configure database connection: {0}")]
    Configure(#[source] rusqlite::Error),

    /// A schema bootstrap statement failed.
    #[error("Unable to execute initializing statement: {statement}: {source}")]
    Bootstrap {
        /// The statement that failed.
        statement: String,
        /// The statement's failure.
        source: QueryError,
    },
}

/// Recoverable failure of one execute, insert or select call.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The statement could not be compiled or a parameter could not be bound.
    #[error("Unable to prepare query: {0}")]
    Prepare(#[source] rusqlite::Error),

    /// The statement was compiled but running it failed.
    #[error("Unable to execute query: {0}")]
    Execute(#[source] rusqlite::Error),

    /// The connection has already been closed.
    #[error("Unable to prepare query: database connection is closed")]
    Closed,
}

/// Errors reading a field from a [`Cursor`](crate::Cursor).
#[derive(Debug, Error)]
pub enum CursorError {
    /// No current row: `next_row` has not returned `true` yet, or the
    /// cursor is exhausted.
    #[error("cursor is not positioned on a row")]
    InvalidState,

    /// The result set has no column with this name.
    #[error("no such column: {0}")]
    NoSuchColumn(String),

    /// Column index past the end of the row.
    #[error("column index {index} out of range for {count} columns")]
    IndexOutOfRange {
        /// Requested zero-based index.
        index: usize,
        /// Number of columns in the result set.
        count: usize,
    },

    /// The field could not be converted to the requested type.
    #[error("cannot convert column {column}: {source}")]
    Conversion {
        /// Column name.
        column: String,
        /// The underlying conversion error.
        source: rusqlite::types::FromSqlError,
    },
}

/// Errors loading a [`DatabaseConfig`](crate::DatabaseConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Any error produced by this crate, keeping the tiers distinct.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
