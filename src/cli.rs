//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared options.
//! Individual command definitions are in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL through a long-lived sqlite3 shell", long_about = None)]
pub struct Args {
    /// Path to the sqlite3 binary (overrides the config file)
    #[arg(long, global = true)]
    pub bin: Option<PathBuf>,

    /// Path to the database (overrides the config file; default :memory:)
    #[arg(short, long, global = true)]
    pub db: Option<String>,

    /// Config file to read instead of ./.sqlite_shell.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}
