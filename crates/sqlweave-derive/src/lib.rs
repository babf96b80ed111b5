//! Derive macros for sqlweave
//!
//! Provides `#[derive(Table)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod sql_ident;
mod table;

/// Derive `Table` metadata for a struct.
///
/// # Example
///
/// ```ignore
/// use sqlweave::Table;
///
/// #[derive(Table)]
/// #[sqlweave(table = "users")]
/// struct User {
///     id: String,
///     #[sqlweave(column = "email_address")]
///     email: String,
///     #[sqlweave(skip)]
///     cached: Option<String>,
/// }
/// ```
///
/// # Generated
///
/// - `impl sqlweave::Table` with `TABLE` and `COLUMNS`
/// - `COL_*: sqlweave::Column` - one handle per column
///
/// # Attributes
///
/// - `#[sqlweave(table = "name")]` - Specify table name (required)
/// - `#[sqlweave(column = "name")]` - Map field to a different column name
/// - `#[sqlweave(skip)]` - Leave the field out of the column list
#[proc_macro_derive(Table, attributes(sqlweave))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    table::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
