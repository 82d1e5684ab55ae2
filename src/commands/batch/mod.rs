mod execute;

use clap::Args;
use std::path::PathBuf;

/// Run statements from a file, one per line
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlite_shell batch -f setup.sql
  sqlite_shell --db app.db batch -f migrations.sql --keep-going
  cat statements.sql | sqlite_shell batch -f -")]
pub struct BatchCmd {
    /// File with one statement per line (`-` reads stdin)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Report failing statements and continue with the rest
    #[arg(short, long, default_value_t = false)]
    pub keep_going: bool,
}
