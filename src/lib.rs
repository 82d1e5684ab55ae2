//! sqlite_shell library - async client for a long-lived `sqlite3` shell
//!
//! Provides the shell session client, SQL literal escaping, and the command
//! execution and output formatting infrastructure behind the CLI.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod output;
pub mod sql;
pub mod types;
pub mod utils;

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod test_utils;

pub use client::{Client, ClientError, ClientOptions, CloseOptions, QueryResult, Row, SessionState};
