//! Forward-only cursor over one executed query.

use std::marker::PhantomData;

use rusqlite::types::FromSql;

use crate::database::Database;
use crate::error::CursorError;
use crate::value::SqlValue;

/// Selects a column of the current row, by name or by zero-based index.
pub trait ColumnIndex {
    /// Resolves to a zero-based index into `columns`.
    fn resolve(&self, columns: &[String]) -> Result<usize, CursorError>;
}

impl ColumnIndex for usize {
    fn resolve(&self, columns: &[String]) -> Result<usize, CursorError> {
        if *self < columns.len() {
            Ok(*self)
        } else {
            Err(CursorError::IndexOutOfRange {
                index: *self,
                count: columns.len(),
            })
        }
    }
}

// Column names compare case-insensitively, like identifiers in SQLite.
impl ColumnIndex for &str {
    fn resolve(&self, columns: &[String]) -> Result<usize, CursorError> {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(self))
            .ok_or_else(|| CursorError::NoSuchColumn((*self).to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// The rows produced by one [`Database::select`] call.
///
/// The cursor owns its rows and starts before the first one. Call
/// [`next_row`](Self::next_row) to step forward; fields are readable only
/// while it last returned `true`. Once exhausted, `next_row` keeps returning
/// `false`. There is no way back.
///
/// A cursor borrows the database it came from, so the connection cannot be
/// closed while the cursor is alive.
#[derive(Debug)]
pub struct Cursor<'db> {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    position: Position,
    _db: PhantomData<&'db Database>,
}

impl Cursor<'_> {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            position: Position::BeforeFirst,
            _db: PhantomData,
        }
    }

    /// Moves to the next row. Returns `false` once no rows are left.
    pub fn next_row(&mut self) -> bool {
        let next = match self.position {
            Position::BeforeFirst => 0,
            Position::At(i) => i + 1,
            Position::Exhausted => return false,
        };

        if next < self.rows.len() {
            self.position = Position::At(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    /// Returns a field of the current row.
    ///
    /// # Errors
    ///
    /// `CursorError::InvalidState` when no row is current, or a lookup error
    /// for an unknown column.
    pub fn value(&self, column: impl ColumnIndex) -> Result<&SqlValue, CursorError> {
        let Position::At(row) = self.position else {
            return Err(CursorError::InvalidState);
        };
        let index = column.resolve(&self.columns)?;
        Ok(&self.rows[row][index])
    }

    /// Returns a field of the current row converted to `T`.
    ///
    /// # Errors
    ///
    /// As [`value`](Self::value), plus `CursorError::Conversion` when the
    /// stored value does not fit `T`.
    pub fn get<T: FromSql>(&self, column: impl ColumnIndex) -> Result<T, CursorError> {
        let Position::At(row) = self.position else {
            return Err(CursorError::InvalidState);
        };
        let index = column.resolve(&self.columns)?;
        T::column_result(self.rows[row][index].as_value_ref()).map_err(|source| {
            CursorError::Conversion {
                column: self.columns[index].clone(),
                source,
            }
        })
    }

    /// Column names of the result set, in select order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` once `next_row` has run past the last row.
    pub fn is_exhausted(&self) -> bool {
        self.position == Position::Exhausted
    }
}
