//! The database handle: connection lifecycle and statement execution.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Batch, Connection, OpenFlags, Statement};

use crate::config::{DatabaseConfig, DATABASE_FILE_NAME};
use crate::cursor::Cursor;
use crate::error::{InitError, QueryError};
use crate::schema;
use crate::value::{SqlParameters, SqlValue};

/// Owner of the single connection to `callrecorder.db`.
///
/// Opening a `Database` creates the data directory and the schema if they
/// are missing. Statements then go through [`execute`](Self::execute),
/// [`insert`](Self::insert) and [`select`](Self::select), which share one
/// prepare, bind and run path and report failures the same way: as a
/// [`QueryError`] and as the text returned by [`last_error`](Self::last_error).
///
/// The last error is kept per handle and overwritten by every statement.
/// `Database` is `Send` but not `Sync`, so a handle is used from one thread
/// at a time.
#[derive(Debug)]
pub struct Database {
    conn: Option<Connection>,
    path: PathBuf,
    last_error: RefCell<String>,
}

impl Database {
    /// Row id callers may store in place of a failed [`insert`](Self::insert).
    pub const NO_ROW_ID: i64 = -1;

    /// Opens the database in the platform data directory.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_default() -> Result<Self, InitError> {
        Self::open(&DatabaseConfig::default())
    }

    /// Opens the database in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_in(dir: impl Into<PathBuf>) -> Result<Self, InitError> {
        Self::open(&DatabaseConfig::in_dir(dir))
    }

    /// Opens (or creates) the database described by `config` and bootstraps
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns `InitError` if the data directory cannot be resolved or
    /// created, the file cannot be opened, the connection cannot be
    /// configured, or a bootstrap statement fails. No handle survives a
    /// failure; the connection is closed before returning.
    pub fn open(config: &DatabaseConfig) -> Result<Self, InitError> {
        let dir = config.resolve_data_dir()?;

        if !dir.is_dir() {
            tracing::info!(path = %dir.display(), "creating data directory");
            std::fs::create_dir_all(&dir).map_err(|source| InitError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        let path = dir.join(DATABASE_FILE_NAME);
        tracing::info!(path = %path.display(), "opening database");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&path, flags).map_err(|source| InitError::Open {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(InitError::Configure)?;

        let db = Self {
            conn: Some(conn),
            path,
            last_error: RefCell::new(String::new()),
        };

        schema::bootstrap(&db)?;

        Ok(db)
    }

    /// Runs a statement that produces no result the caller needs.
    ///
    /// Rows produced by the statement, if any, are stepped through and
    /// discarded. `statement` must hold exactly one SQL statement; empty text
    /// and text with several statements fail to prepare.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if preparing, binding or running fails.
    pub fn execute(&self, statement: &str, params: &SqlParameters) -> Result<(), QueryError> {
        self.run(statement, params, |_, stmt| {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
            Ok(())
        })
    }

    /// Runs an insert and returns the rowid it generated.
    ///
    /// An `Err` means no row was inserted. That includes an insert that ran
    /// but changed nothing, such as `INSERT OR IGNORE` hitting an existing
    /// key, which fails with `QueryError::Execute` instead of reporting a
    /// stale rowid. When one statement inserts several rows, the rowid of the
    /// last one is returned.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if preparing, binding or running fails,
    /// including constraint violations.
    pub fn insert(&self, statement: &str, params: &SqlParameters) -> Result<i64, QueryError> {
        self.run(statement, params, |conn, stmt| {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
            drop(rows);

            if conn.changes() == 0 {
                return Err(rusqlite::Error::StatementChangedRows(0));
            }
            Ok(conn.last_insert_rowid())
        })
    }

    /// Runs a query and returns a cursor over all of its rows.
    ///
    /// Like [`execute`](Self::execute), `statement` must hold exactly one
    /// SQL statement.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if preparing, binding or running fails. Rows are
    /// read eagerly, so a failure part-way through the result is reported
    /// here rather than from the cursor.
    pub fn select(&self, statement: &str, params: &SqlParameters) -> Result<Cursor<'_>, QueryError> {
        let (columns, rows) = self.run(statement, params, |_, stmt| {
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let count = columns.len();

            let mut rows = stmt.raw_query();
            let mut snapshot = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(count);
                for index in 0..count {
                    values.push(SqlValue::from(row.get_ref(index)?));
                }
                snapshot.push(values);
            }

            Ok((columns, snapshot))
        })?;

        Ok(Cursor::new(columns, rows))
    }

    /// Error text of the most recent execute, insert or select on this
    /// handle. Empty if that call succeeded.
    pub fn last_error(&self) -> String {
        self.last_error.borrow().clone()
    }

    /// Column names of `table` in declaration order.
    ///
    /// An empty name, an unknown table, a closed connection and an
    /// introspection failure all yield an empty list. This does not touch
    /// [`last_error`](Self::last_error), and it cannot tell a missing table
    /// from one without columns.
    pub fn table_columns(&self, table: &str) -> Vec<String> {
        if table.is_empty() {
            return Vec::new();
        }
        let Some(conn) = self.conn.as_ref() else {
            return Vec::new();
        };

        match read_table_columns(conn, table) {
            Ok(columns) => columns,
            Err(e) => {
                tracing::debug!(table, error = %e, "table introspection failed");
                Vec::new()
            }
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Closes the connection. Calling it again does nothing.
    ///
    /// A failure to close cleanly is logged and otherwise ignored. Statements
    /// issued after closing fail with `QueryError::Closed`.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!(path = %self.path.display(), "closing database");
            if let Err((_, e)) = conn.close() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to close database cleanly");
            }
        }
    }

    fn run<T, F>(&self, statement: &str, params: &SqlParameters, consume: F) -> Result<T, QueryError>
    where
        F: FnOnce(&Connection, &mut Statement<'_>) -> rusqlite::Result<T>,
    {
        tracing::debug!(statement, params = params.len(), "running statement");

        self.last_error.borrow_mut().clear();

        let result = self.prepare_and_execute(statement, params, consume);
        if let Err(e) = &result {
            let text = e.to_string();
            tracing::debug!(statement, error = %text, "statement failed");
            *self.last_error.borrow_mut() = text;
        }
        result
    }

    fn prepare_and_execute<T, F>(
        &self,
        statement: &str,
        params: &SqlParameters,
        consume: F,
    ) -> Result<T, QueryError>
    where
        F: FnOnce(&Connection, &mut Statement<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn.as_ref().ok_or(QueryError::Closed)?;
        let mut stmt = prepare_single(conn, statement).map_err(QueryError::Prepare)?;

        bind_parameters(&mut stmt, params)?;

        consume(conn, &mut stmt).map_err(QueryError::Execute)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

/// Prepares exactly one statement from `sql`.
///
/// Text holding only whitespace or comments compiles to no statement and is
/// rejected, as is text with a second statement after the first.
fn prepare_single<'conn>(conn: &'conn Connection, sql: &str) -> rusqlite::Result<Statement<'conn>> {
    let mut batch = Batch::new(conn, sql);

    let Some(stmt) = batch.next()? else {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
            Some("empty statement".to_string()),
        ));
    };

    if batch.next()?.is_some() {
        return Err(rusqlite::Error::MultipleStatement);
    }

    Ok(stmt)
}

/// Binds every parameter by name, then checks that no placeholder is left
/// without a value.
fn bind_parameters(stmt: &mut Statement<'_>, params: &SqlParameters) -> Result<(), QueryError> {
    for (name, value) in params.iter() {
        let index = stmt
            .parameter_index(name)
            .map_err(QueryError::Prepare)?
            .ok_or_else(|| QueryError::Prepare(rusqlite::Error::InvalidParameterName(name.to_string())))?;
        stmt.raw_bind_parameter(index, value)
            .map_err(QueryError::Prepare)?;
    }

    let expected = stmt.parameter_count();
    for index in 1..=expected {
        let bound = stmt
            .parameter_name(index)
            .is_some_and(|name| params.contains(name));
        if !bound {
            return Err(QueryError::Execute(rusqlite::Error::InvalidParameterCount(
                params.len(),
                expected,
            )));
        }
    }

    Ok(())
}

fn read_table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db = Database::open_in(dir.path()).expect("open should succeed");
        (dir, db)
    }

    fn phone_number_count(db: &Database) -> i64 {
        let mut cursor = db
            .select("SELECT COUNT(*) FROM PhoneNumbers", &SqlParameters::new())
            .expect("count should succeed");
        assert!(cursor.next_row());
        cursor.get(0).expect("count is an integer")
    }

    #[test]
    fn success_clears_last_error() {
        let (_dir, db) = test_db();

        // A typo fails at prepare and leaves its text behind
        let err = db
            .execute("SELEC 1", &SqlParameters::new())
            .expect_err("typo should fail");
        assert!(matches!(err, QueryError::Prepare(_)));
        assert!(db.last_error().starts_with("Unable to prepare query: "));

        // The next successful call wipes it
        db.execute("SELECT 1", &SqlParameters::new())
            .expect("valid statement should succeed");
        assert_eq!(db.last_error(), "");
    }

    #[test]
    fn empty_statement_fails_to_prepare() {
        let (_dir, db) = test_db();
        let params = SqlParameters::new();

        for sql in ["", "   ", "   -- just a comment", "/* nothing */"] {
            let err = db.execute(sql, &params).expect_err("empty execute should fail");
            assert!(matches!(err, QueryError::Prepare(_)), "{sql:?}: {err:?}");
            assert_eq!(db.last_error(), "Unable to prepare query: empty statement");

            let err = db.insert(sql, &params).expect_err("empty insert should fail");
            assert!(matches!(err, QueryError::Prepare(_)), "{sql:?}: {err:?}");

            let err = db.select(sql, &params).expect_err("empty select should fail");
            assert!(matches!(err, QueryError::Prepare(_)), "{sql:?}: {err:?}");
            assert_eq!(db.last_error(), "Unable to prepare query: empty statement");
        }
    }

    #[test]
    fn several_statements_fail_to_prepare_and_run_nothing() {
        let (_dir, db) = test_db();

        let err = db
            .execute(
                "INSERT INTO PhoneNumbers(LineIdentification) VALUES('a'); \
                 INSERT INTO PhoneNumbers(LineIdentification) VALUES('b');",
                &SqlParameters::new(),
            )
            .expect_err("two statements should be rejected");
        assert!(matches!(err, QueryError::Prepare(rusqlite::Error::MultipleStatement)));
        assert!(db.last_error().starts_with("Unable to prepare query: "));

        // Neither insert ran; only the sentinel row is present
        assert_eq!(phone_number_count(&db), 1);

        // A trailing comment after one statement is fine
        db.execute("SELECT 1; -- trailing note", &SqlParameters::new())
            .expect("trailing comment is not a second statement");
    }

    #[test]
    fn ignored_insert_reports_no_row() {
        let (_dir, db) = test_db();

        let err = db
            .insert(
                "INSERT OR IGNORE INTO PhoneNumbers(ID, LineIdentification) VALUES(1, 'dup')",
                &SqlParameters::new(),
            )
            .expect_err("an insert that changed nothing has no row id");
        assert!(matches!(
            err,
            QueryError::Execute(rusqlite::Error::StatementChangedRows(0))
        ));
        assert!(db.last_error().starts_with("Unable to execute query: "));

        // The sentinel row is untouched
        let mut cursor = db
            .select(
                "SELECT LineIdentification FROM PhoneNumbers WHERE ID = 1",
                &SqlParameters::new(),
            )
            .expect("select should succeed");
        assert!(cursor.next_row());
        assert_eq!(cursor.get::<String>(0).expect("text"), "");
    }

    #[test]
    fn unknown_parameter_name_fails_to_prepare() {
        let (_dir, db) = test_db();

        let err = db
            .execute(
                "UPDATE PhoneNumbers SET LineIdentification = :v WHERE ID = 1",
                &SqlParameters::new().with("v", "x").with("bogus", 1),
            )
            .expect_err("unknown key should fail");

        assert!(matches!(err, QueryError::Prepare(_)), "unexpected error: {err:?}");
        assert_eq!(db.last_error(), err.to_string());
    }

    #[test]
    fn repeated_placeholder_binds_once() {
        let (_dir, db) = test_db();

        // Both occurrences of :n share one binding
        let mut cursor = db
            .select("SELECT :n + :n AS Twice", &SqlParameters::new().with(":n", 21))
            .expect("select should succeed");
        assert!(cursor.next_row());
        assert_eq!(cursor.get::<i64>("Twice").expect("integer"), 42);
    }

    #[test]
    fn close_is_idempotent_and_blocks_statements() {
        let (_dir, mut db) = test_db();

        db.close();
        db.close();
        assert!(!db.is_open());

        // Statements on a closed handle report through the prepare prefix
        let err = db
            .execute("SELECT 1", &SqlParameters::new())
            .expect_err("closed handle should fail");
        assert!(matches!(err, QueryError::Closed));
        assert_eq!(
            db.last_error(),
            "Unable to prepare query: database connection is closed"
        );

        // Introspection stays silent
        assert!(db.table_columns("Events").is_empty());
    }

    #[test]
    fn execute_steps_through_result_rows() {
        let (_dir, db) = test_db();

        db.execute("SELECT ID FROM PhoneNumbers", &SqlParameters::new())
            .expect("execute accepts statements that return rows");
        assert_eq!(db.last_error(), "");
    }

    #[test]
    fn database_file_lives_in_data_dir() {
        let (dir, db) = test_db();
        assert_eq!(db.path(), dir.path().join("callrecorder.db"));
        assert!(db.path().is_file());
    }
}
