//! Shared result types for CLI commands.

mod report;

pub use report::{SessionReport, StatementReport};
