//! Placeholder values and their resolution to SQL text.
//!
//! Every value interpolated into a template is classified by its first
//! character:
//!
//! | prefix | kind         | output                                  |
//! |--------|--------------|-----------------------------------------|
//! | `@`    | table ref    | `t.c`, `t.c->'a'->>'b'`, `'$.a'`, alias |
//! | `$`    | result key   | the key without `$`                     |
//! | `§`    | raw fragment | the fragment without `§`                |
//! | `:`    | named param  | unchanged, left for the executor        |
//!
//! Anything else is emitted verbatim. Resolution is pure and never fails.

mod table_ref;


pub use table_ref::{Arrow, ArrowStep, JsonPath, TableRef};

use table_ref::quote_ident;

use std::fmt;

pub const TABLE_SENTINEL: char = '@';
pub const RESULT_KEY_SENTINEL: char = '$';
pub const RAW_SENTINEL: char = '§';
pub const PARAM_SENTINEL: char = ':';

/// Options that affect how placeholders render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerOptions {
    /// Double-quote the table name of the column-list shorthand.
    pub quote_identifiers: bool,
}

/// `table (c1, c2, ...)` shorthand, e.g. for INSERT column lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    table: String,
    columns: Vec<String>,
}

impl TableColumns {
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn render(&self, options: &LowerOptions) -> String {
        let columns = self.columns.join(", ");
        if options.quote_identifiers {
            format!("{} ({columns})", quote_ident(&self.table))
        } else {
            format!("{} ({columns})", self.table)
        }
    }
}

/// A classified template value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    TableColumns(TableColumns),
    TableRef(TableRef),
    /// `$key`: a key of the result record.
    ResultKey(String),
    /// `:name`: a named parameter.
    Param(String),
    /// `§fragment`: SQL inserted as-is.
    Raw(String),
    /// Any other value, inserted as-is.
    Verbatim(String),
}

impl Placeholder {
    /// Classify a string value by its sentinel prefix.
    pub fn parse(value: &str) -> Self {
        let mut chars = value.chars();
        match chars.next() {
            Some(TABLE_SENTINEL) => Placeholder::TableRef(TableRef::parse(chars.as_str())),
            Some(RESULT_KEY_SENTINEL) => Placeholder::ResultKey(chars.as_str().to_string()),
            Some(RAW_SENTINEL) => Placeholder::Raw(chars.as_str().to_string()),
            Some(PARAM_SENTINEL) => Placeholder::Param(chars.as_str().to_string()),
            _ => Placeholder::Verbatim(value.to_string()),
        }
    }

    pub fn raw(fragment: impl Into<String>) -> Self {
        Placeholder::Raw(fragment.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Placeholder::Param(name.into())
    }

    pub fn result_key(key: impl Into<String>) -> Self {
        Placeholder::ResultKey(key.into())
    }

    /// Render this value to SQL text.
    pub fn resolve(&self, options: &LowerOptions) -> String {
        match self {
            Placeholder::TableColumns(tc) => tc.render(options),
            Placeholder::TableRef(r) => r.render(),
            Placeholder::ResultKey(key) => key.clone(),
            Placeholder::Param(name) => format!("{PARAM_SENTINEL}{name}"),
            Placeholder::Raw(fragment) => fragment.clone(),
            Placeholder::Verbatim(text) => text.clone(),
        }
    }
}

/// Resolve with default options.
pub fn resolve(value: &Placeholder) -> String {
    value.resolve(&LowerOptions::default())
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&resolve(self))
    }
}

impl From<&str> for Placeholder {
    fn from(value: &str) -> Self {
        Placeholder::parse(value)
    }
}

impl From<String> for Placeholder {
    fn from(value: String) -> Self {
        Placeholder::parse(&value)
    }
}

impl From<&String> for Placeholder {
    fn from(value: &String) -> Self {
        Placeholder::parse(value)
    }
}

impl From<TableColumns> for Placeholder {
    fn from(value: TableColumns) -> Self {
        Placeholder::TableColumns(value)
    }
}

impl From<TableRef> for Placeholder {
    fn from(value: TableRef) -> Self {
        Placeholder::TableRef(value)
    }
}

/// Conversion used by template interpolation.
///
/// `None` means "no value" and contributes nothing to the output.
pub trait IntoPlaceholder {
    fn into_placeholder(self) -> Option<Placeholder>;
}

impl IntoPlaceholder for Placeholder {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(self)
    }
}

impl IntoPlaceholder for &Placeholder {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(self.clone())
    }
}

impl IntoPlaceholder for &str {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::parse(self))
    }
}

impl IntoPlaceholder for String {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::parse(&self))
    }
}

impl IntoPlaceholder for &String {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::parse(self))
    }
}

impl IntoPlaceholder for TableColumns {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::TableColumns(self))
    }
}

impl IntoPlaceholder for TableRef {
    fn into_placeholder(self) -> Option<Placeholder> {
        Some(Placeholder::TableRef(self))
    }
}

impl<T: IntoPlaceholder> IntoPlaceholder for Option<T> {
    fn into_placeholder(self) -> Option<Placeholder> {
        self.and_then(IntoPlaceholder::into_placeholder)
    }
}

macro_rules! verbatim_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoPlaceholder for $ty {
                fn into_placeholder(self) -> Option<Placeholder> {
                    Some(Placeholder::Verbatim(self.to_string()))
                }
            }
        )*
    };
}

verbatim_display!(bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);
