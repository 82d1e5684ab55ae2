//! Literal escaping and statement building for the SQLite shell.
//!
//! The shell has no parameter binding, so values are escaped into literals
//! before a statement is written to its input.

mod escape;
mod query;
mod value;

pub use escape::{escape, quote_identifier, quote_string};
pub use query::Query;
pub use value::{NULL_LITERAL, SqlValue};
