//! Shared test utilities for session and command tests.
//!
//! The session state machine is exercised against [`RecordingInput`], which
//! captures everything the session would write to the shell.

use serde_json::Value;

use crate::client::framer::OutputFramer;
use crate::client::process::ShellInput;
use crate::client::session::{Session, SharedState};
use crate::client::QueryResult;

/// Sentinel line used by [`recording_session`].
pub const SENTINEL: &str = "-- eoq testtoken0000001\n";

/// Fake shell input that records writes instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct RecordingInput {
    writes: Vec<String>,
    closed: bool,
    killed: bool,
}

impl RecordingInput {
    pub fn writes(&self) -> Vec<String> {
        self.writes.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }
}

impl ShellInput for RecordingInput {
    fn write(&mut self, text: String) {
        if !self.closed {
            self.writes.push(text);
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn kill(&mut self) {
        self.killed = true;
    }
}

/// Open session over a [`RecordingInput`] with the fixed [`SENTINEL`].
pub fn recording_session() -> Session<RecordingInput> {
    Session::new(
        RecordingInput::default(),
        SharedState::new(),
        OutputFramer::new(SENTINEL.to_string()),
    )
}

/// Build an expected row result from a JSON array literal.
pub fn rows(value: Value) -> QueryResult {
    let bytes = serde_json::to_vec(&value).expect("Failed to serialize rows");
    QueryResult::parse(&bytes).expect("Expected rows to parse")
}
