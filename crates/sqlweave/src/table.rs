//! Compile-time table descriptors.
//!
//! Usually generated with `#[derive(Table)]`:
//!
//! ```ignore
//! use sqlweave::{Table, sql};
//!
//! #[derive(Table)]
//! #[sqlweave(table = "users")]
//! struct User {
//!     id: i64,
//!     email: String,
//!     metadata: serde_json::Value,
//! }
//!
//! let q = sql!(
//!     "SELECT {}, {} FROM {} WHERE {} = :id",
//!     User::COL_EMAIL,
//!     User::COL_METADATA.json("->role"),
//!     User::table_ref(),
//!     User::COL_ID,
//! );
//! assert_eq!(q, "SELECT users.email, users.metadata->'role' FROM users WHERE users.id = :id");
//! ```

use crate::placeholder::{IntoPlaceholder, Placeholder, TableColumns, TableRef};
use std::fmt;

/// A column of a known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    table: &'static str,
    name: &'static str,
}

impl Column {
    pub const fn new(table: &'static str, name: &'static str) -> Self {
        Self { table, name }
    }

    pub const fn table(&self) -> &'static str {
        self.table
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// `table.column`
    pub fn reference(&self) -> TableRef {
        TableRef::column(self.table, self.name)
    }

    /// The bare column name, as an alias reference.
    pub fn alias(&self) -> TableRef {
        self.reference().aliased()
    }

    /// JSON path into this column: `->a->>b` or `$.a.b`.
    pub fn json(&self, path: &str) -> TableRef {
        TableRef::parse(&format!("{}.{} {path}", self.table, self.name))
    }

    /// `:column`
    pub fn param(&self) -> Placeholder {
        Placeholder::param(self.name)
    }

    /// `$column`
    pub fn key(&self) -> Placeholder {
        Placeholder::result_key(self.name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

impl IntoPlaceholder for Column {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::TableRef(self.reference()))
    }
}

impl From<Column> for Placeholder {
    fn from(column: Column) -> Self {
        Placeholder::TableRef(column.reference())
    }
}

/// A table with a fixed column list.
pub trait Table {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// `table (c1, c2, ...)` over every column.
    fn columns() -> TableColumns {
        TableColumns::new(Self::TABLE, Self::COLUMNS.iter().copied())
    }

    /// `table (..)` over the given columns.
    fn columns_of(columns: &[Column]) -> TableColumns {
        TableColumns::new(Self::TABLE, columns.iter().map(Column::name))
    }

    fn table_ref() -> TableRef {
        TableRef::table(Self::TABLE)
    }

    /// `table.*`
    fn all() -> TableRef {
        TableRef::column(Self::TABLE, "*")
    }

    fn column(name: &str) -> Option<Column> {
        Self::COLUMNS
            .iter()
            .find(|c| **c == name)
            .map(|c| Column::new(Self::TABLE, *c))
    }
}
