mod execute;

use clap::Args;

/// Run one or more statements on a single session
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlite_shell query 'SELECT 1 AS x'
  sqlite_shell --db app.db query 'CREATE TABLE t (id)' 'INSERT INTO t VALUES (1)'
  sqlite_shell --format json query 'SELECT * FROM t'")]
pub struct QueryCmd {
    /// Statements to run, in order
    #[arg(required = true, value_name = "STATEMENT")]
    pub statements: Vec<String>,
}
