//! Fixed schema bootstrap.
//!
//! The statements run in order every time a database is opened. Each one is
//! idempotent, so an existing file is left as it is and a fresh file ends up
//! with both tables and the sentinel phone number.

use crate::database::Database;
use crate::error::InitError;
use crate::value::SqlParameters;

/// ID of the `PhoneNumbers` row that stands for an unknown caller.
pub const UNKNOWN_PHONE_NUMBER_ID: i64 = 1;

/// A single bootstrap step.
struct BootstrapStatement {
    name: &'static str,
    sql: &'static str,
}

/// All bootstrap steps in order.
const BOOTSTRAP: &[BootstrapStatement] = &[
    BootstrapStatement {
        name: "foreign_keys",
        sql: "PRAGMA foreign_keys = ON;",
    },
    BootstrapStatement {
        name: "phone_numbers",
        sql: "CREATE TABLE IF NOT EXISTS PhoneNumbers(
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            LineIdentification TEXT
        );",
    },
    BootstrapStatement {
        name: "unknown_phone_number",
        sql: "INSERT OR IGNORE INTO PhoneNumbers(ID, LineIdentification) VALUES(1, '');",
    },
    BootstrapStatement {
        name: "events",
        sql: "CREATE TABLE IF NOT EXISTS Events(
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            TimeStamp TEXT,
            PhoneNumberID INTEGER,
            EventTypeID INTEGER,
            RecordingStateID INTEGER,
            Duration INTEGER,
            FileName TEXT,
            FileSize INTEGER,
            FOREIGN KEY(PhoneNumberID) REFERENCES PhoneNumbers(ID)
        );",
    },
];

/// Runs every bootstrap statement against `db`.
///
/// # Errors
///
/// Returns `InitError::Bootstrap` for the first statement that fails; later
/// statements are not attempted.
pub(crate) fn bootstrap(db: &Database) -> Result<(), InitError> {
    bootstrap_from_list(db, BOOTSTRAP)
}

fn bootstrap_from_list(db: &Database, statements: &[BootstrapStatement]) -> Result<(), InitError> {
    let params = SqlParameters::new();

    for statement in statements {
        tracing::debug!(step = statement.name, "running bootstrap statement");

        db.execute(statement.sql, &params)
            .map_err(|source| InitError::Bootstrap {
                statement: statement.sql.to_string(),
                source,
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db = Database::open_in(dir.path()).expect("first open should succeed");

        bootstrap(&db).expect("second bootstrap should succeed");

        let mut cursor = db
            .select("SELECT COUNT(*) FROM PhoneNumbers", &SqlParameters::new())
            .expect("count should succeed");
        assert!(cursor.next_row());
        assert_eq!(cursor.get::<i64>(0).expect("count is an integer"), 1);
    }

    #[test]
    fn failing_statement_stops_bootstrap() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db = Database::open_in(dir.path()).expect("open should succeed");
        let statements = [
            BootstrapStatement {
                name: "broken",
                sql: "CREATE TABLEX Broken(ID INTEGER);",
            },
            BootstrapStatement {
                name: "never_reached",
                sql: "CREATE TABLE NeverReached(ID INTEGER);",
            },
        ];

        let err = bootstrap_from_list(&db, &statements).expect_err("broken statement should fail");

        match err {
            InitError::Bootstrap { statement, source } => {
                assert_eq!(statement, "CREATE TABLEX Broken(ID INTEGER);");
                assert!(matches!(source, QueryError::Prepare(_)));
            }
            other => panic!("unexpected error type: {other:?}"),
        }

        assert!(db.table_columns("NeverReached").is_empty());
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db = Database::open_in(dir.path()).expect("open should succeed");

        let mut cursor = db
            .select("PRAGMA foreign_keys;", &SqlParameters::new())
            .expect("pragma query should succeed");
        assert!(cursor.next_row());
        assert_eq!(cursor.get::<i64>(0).expect("pragma is an integer"), 1);
    }
}
