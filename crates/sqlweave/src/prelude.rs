//! Convenient imports for common functionality.
//!
//! ```ignore
//! use sqlweave::prelude::*;
//! ```

pub use crate::client::{Client, Config, QueryOptions};
pub use crate::error::{Issue, WeaveError, WeaveResult};
pub use crate::executor::{QueryExecutor, RowSource, Statement};
pub use crate::params::{Params, ParamsSource};
pub use crate::placeholder::{Placeholder, TableColumns};
pub use crate::stream::{Execution, QueryStream};
pub use crate::table::{Column, Table};
pub use crate::template::{SqlHelper, build, cond, cond_else, raw};
pub use crate::validate::{Schema, Validator, schema, validator_fn};
pub use crate::sql;

#[cfg(feature = "derive")]
pub use sqlweave_derive::Table;
