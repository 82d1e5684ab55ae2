//! Parsed statement results.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Deserializer, Map, Value};

use super::ClientError;

/// One result row, keyed by column name in result order.
pub type Row = Map<String, Value>;

/// Outcome of a successfully executed statement.
///
/// Statements that print nothing (DDL, inserts, queries matching no rows)
/// resolve to `Empty` rather than an empty row list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    #[default]
    Empty,
    Rows(Vec<Row>),
}

impl QueryResult {
    /// Parse the shell's JSON output for one statement.
    ///
    /// A statement string holding several statements prints one JSON array per
    /// statement; their rows are concatenated in output order.
    pub(crate) fn parse(payload: &[u8]) -> Result<Self, ClientError> {
        let text = std::str::from_utf8(payload).map_err(|e| ClientError::MalformedOutput {
            message: format!("output is not valid UTF-8: {}", e),
        })?;

        if text.trim().is_empty() {
            return Ok(QueryResult::Empty);
        }

        let mut rows = Vec::new();
        for batch in Deserializer::from_str(text).into_iter::<Vec<Row>>() {
            let batch = batch.map_err(|e| ClientError::MalformedOutput {
                message: format!("{}: {}", e, text.trim()),
            })?;
            rows.extend(batch);
        }

        if rows.is_empty() {
            Ok(QueryResult::Empty)
        } else {
            Ok(QueryResult::Rows(rows))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            QueryResult::Empty => &[],
            QueryResult::Rows(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Empty => Vec::new(),
            QueryResult::Rows(rows) => rows,
        }
    }

    /// Column names taken from the first row.
    pub fn headers(&self) -> Vec<String> {
        self.rows()
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Decode every row into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<Vec<T>, ClientError> {
        self.into_rows()
            .into_iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row)).map_err(|e| ClientError::Decode {
                    message: e.to_string(),
                })
            })
            .collect()
    }
}
