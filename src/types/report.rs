//! Per-statement and per-session reports produced by CLI commands.

use serde::Serialize;

use crate::client::{ClientError, QueryResult, Row};

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementReport {
    pub statement: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatementReport {
    pub fn new(statement: impl Into<String>, result: Result<QueryResult, ClientError>) -> Self {
        let (rows, error) = match result {
            Ok(result) => (result.into_rows(), None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        Self {
            statement: statement.into(),
            rows,
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything that happened on one session, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub statements: Vec<StatementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl SessionReport {
    pub fn push(&mut self, report: StatementReport) {
        self.statements.push(report);
    }

    /// Number of statements that failed.
    pub fn error_count(&self) -> usize {
        self.statements.iter().filter(|s| s.is_error()).count()
    }

    /// Any statement failed, or the shell exited with a non-zero code.
    pub fn failed(&self) -> bool {
        self.error_count() > 0 || self.exit_code.is_some_and(|code| code != 0)
    }
}
