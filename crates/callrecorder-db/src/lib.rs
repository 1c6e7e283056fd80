//! Storage core for the call recorder.
//!
//! Owns one SQLite connection to `callrecorder.db` in the per-user data
//! directory, creates the `PhoneNumbers` and `Events` tables on first use,
//! and runs parameterized statements through three primitives:
//! [`Database::execute`], [`Database::insert`] and [`Database::select`].
//! Query results come back as a forward-only [`Cursor`].
//!
//! # Errors
//!
//! Opening a database fails with an [`InitError`], which is fatal for that
//! attempt. Individual statements fail with a [`QueryError`], which leaves
//! the handle usable; the same text is available afterwards from
//! [`Database::last_error`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use callrecorder_db::{Database, SqlParameters};
//!
//! let db = Database::open_default()?;
//! let id = db.insert(
//!     "INSERT INTO PhoneNumbers(LineIdentification) VALUES(:number)",
//!     &SqlParameters::new().with("number", "+15550100"),
//! )?;
//!
//! let mut cursor = db.select(
//!     "SELECT LineIdentification FROM PhoneNumbers WHERE ID = :id",
//!     &SqlParameters::new().with("id", id),
//! )?;
//! while cursor.next_row() {
//!     let number: String = cursor.get("LineIdentification")?;
//!     println!("{number}");
//! }
//! # Ok::<(), callrecorder_db::DbError>(())
//! ```

mod config;
mod cursor;
mod database;
mod error;
mod schema;
mod value;

pub use config::{load_config, DatabaseConfig, DATABASE_FILE_NAME};
pub use cursor::{ColumnIndex, Cursor};
pub use database::Database;
pub use error::{ConfigError, CursorError, DbError, InitError, QueryError};
pub use schema::UNKNOWN_PHONE_NUMBER_ID;
pub use value::{SqlParameters, SqlValue};
