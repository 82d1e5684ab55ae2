//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `execute.rs` implementing [`Execute`] against an open [`Client`]

mod batch;
mod query;

pub use batch::BatchCmd;
pub use query::QueryCmd;

use clap::Subcommand;
use std::error::Error;
use tracing::warn;

use crate::client::{Client, ClientError, CloseOptions};
use crate::output::{OutputFormat, Outputable};
use crate::types::{SessionReport, StatementReport};

/// Trait for executing commands with command-specific result types.
#[allow(async_fn_in_trait)]
pub trait Execute {
    type Output: Outputable;

    async fn execute(self, client: &Client) -> Result<Self::Output, Box<dyn Error>>;
}

/// Formatted command output plus whether anything went wrong.
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub failed: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one or more statements on a single session
    Query(QueryCmd),

    /// Run statements from a file, one per line
    Batch(BatchCmd),
}

impl Command {
    /// Execute the command and return formatted output
    pub async fn run(
        self,
        client: &Client,
        format: OutputFormat,
    ) -> Result<CommandOutput, Box<dyn Error>> {
        let report = match self {
            Command::Query(cmd) => cmd.execute(client).await?,
            Command::Batch(cmd) => cmd.execute(client).await?,
        };
        Ok(CommandOutput {
            text: report.format(format),
            failed: report.failed(),
        })
    }
}

/// Run statements in order, then close the session gracefully.
///
/// Stops at the first failing statement unless `keep_going` is set. Once the
/// shell is gone, remaining statements are not attempted.
pub(crate) async fn run_statements<I>(
    client: &Client,
    statements: I,
    keep_going: bool,
) -> Result<SessionReport, ClientError>
where
    I: IntoIterator<Item = String>,
{
    let mut report = SessionReport::default();

    for statement in statements {
        let result = client.run(&statement).await;
        let failed = result.is_err();
        report.push(StatementReport::new(statement, result));

        if !client.running() || (failed && !keep_going) {
            break;
        }
    }

    report.exit_code = match client.close(CloseOptions::default()).await {
        Ok(code) => Some(code),
        Err(ClientError::UnexpectedExit { code }) => Some(code),
        Err(ClientError::SessionClosed) => {
            warn!("session already closed, exit code unavailable");
            None
        }
        Err(e) => return Err(e),
    };

    Ok(report)
}
