use std::error::Error;
use std::path::Path;

use tokio::io::AsyncReadExt;

use super::BatchCmd;
use crate::client::Client;
use crate::commands::{Execute, run_statements};
use crate::types::SessionReport;

const STDIN_PATH: &str = "-";

impl Execute for BatchCmd {
    type Output = SessionReport;

    async fn execute(self, client: &Client) -> Result<Self::Output, Box<dyn Error>> {
        let content = read_source(&self.file).await?;
        Ok(run_statements(client, split_statements(&content), self.keep_going).await?)
    }
}

async fn read_source(path: &Path) -> Result<String, Box<dyn Error>> {
    if path == Path::new(STDIN_PATH) {
        let mut content = String::new();
        tokio::io::stdin().read_to_string(&mut content).await?;
        return Ok(content);
    }

    tokio::fs::read_to_string(path).await.map_err(|e| {
        Box::new(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        )) as Box<dyn Error>
    })
}

/// One statement per non-empty line, surrounding whitespace removed.
fn split_statements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
