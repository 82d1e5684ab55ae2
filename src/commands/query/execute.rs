use std::error::Error;

use super::QueryCmd;
use crate::client::Client;
use crate::commands::{Execute, run_statements};
use crate::types::SessionReport;

impl Execute for QueryCmd {
    type Output = SessionReport;

    async fn execute(self, client: &Client) -> Result<Self::Output, Box<dyn Error>> {
        Ok(run_statements(client, self.statements, false).await?)
    }
}
