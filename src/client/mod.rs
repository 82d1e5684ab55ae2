//! Asynchronous client for a long-lived `sqlite3` shell process.
//!
//! The shell is driven as a persistent worker: statements are written to its
//! stdin, and its JSON output is framed back into one result per statement.
//!
//! # Architecture
//!
//! - [`process`] launches the shell and turns its pipes and exit into events
//! - [`session`] owns all mutable state inside a single actor task
//! - [`framer`] detects the end of each response using a per-session sentinel
//! - [`task`] holds one queued statement and its single-use result slot
//!
//! [`Client`] is the handle callers use. It can be shared (e.g. behind an
//! `Arc`) once opened; statements from concurrent callers run one at a time in
//! submission order.

pub(crate) mod framer;
pub(crate) mod process;
mod result;
pub(crate) mod session;
pub(crate) mod task;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub use framer::SENTINEL_PREFIX;
pub use result::{QueryResult, Row};
pub use session::{FORCED_EXIT_CODE, SessionState};
pub use task::{DIRECTIVE_PREFIX, is_directive};

use framer::OutputFramer;
use session::{Event, Session, SharedState};

/// Client error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Failed to launch '{bin}': {message}")]
    LaunchFailed { bin: String, message: String },

    #[error("Connection already open")]
    AlreadyOpen,

    #[error("Connection already closed")]
    SessionClosed,

    #[error("Shell commands are not allowed: {statement}")]
    DirectiveRejected { statement: String },

    #[error("{message}")]
    Statement { message: String },

    #[error("Shell exited unexpectedly with code {code}")]
    UnexpectedExit { code: i32 },

    #[error("Malformed shell output: {message}")]
    MalformedOutput { message: String },

    #[error("Failed to decode row: {message}")]
    Decode { message: String },
}

fn default_bin() -> PathBuf {
    PathBuf::from("sqlite3")
}

fn default_path() -> String {
    ":memory:".to_string()
}

/// How to launch the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Path to the sqlite3 binary
    #[serde(default = "default_bin")]
    pub bin: PathBuf,
    /// Path to the database
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            bin: default_bin(),
            path: default_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    /// Kill the shell instead of letting queued statements drain.
    pub force: bool,
}

impl CloseOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Handle to one shell session.
#[derive(Debug)]
pub struct Client {
    options: ClientOptions,
    state: Arc<SharedState>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl Client {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            state: SharedState::new(),
            events: None,
        }
    }

    /// Create a client and open it.
    pub async fn connect(options: ClientOptions) -> Result<Self, ClientError> {
        let mut client = Self::new(options);
        client.open().await?;
        Ok(client)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Whether the shell is up and has not been closed.
    pub fn running(&self) -> bool {
        matches!(self.state(), SessionState::Open | SessionState::Closing)
    }

    /// Launch the shell.
    ///
    /// A launch failure leaves the client unopened, so `open` may be retried.
    /// A closed client can never be reopened.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        match self.state() {
            SessionState::Unopened => {}
            SessionState::Closed => return Err(ClientError::SessionClosed),
            SessionState::Open | SessionState::Closing => return Err(ClientError::AlreadyOpen),
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let input = process::spawn(&self.options, events.clone())?;
        let session = Session::new(input, Arc::clone(&self.state), OutputFramer::generate());
        tokio::spawn(session::drive(session, receiver));

        self.events = Some(events);
        Ok(())
    }

    /// Close the session and return the shell's exit code.
    ///
    /// Without `force`, statements already queued run first, then the shell is
    /// asked to exit and this resolves once it has. With `force`, the shell is
    /// killed, every outstanding statement fails with
    /// [`ClientError::SessionClosed`], and this resolves to
    /// [`FORCED_EXIT_CODE`] without waiting for the process.
    pub async fn close(&self, options: CloseOptions) -> Result<i32, ClientError> {
        let Some(events) = &self.events else {
            return Err(ClientError::SessionClosed);
        };
        if self.state() == SessionState::Closed {
            return Err(ClientError::SessionClosed);
        }

        let (reply, result) = oneshot::channel();
        events
            .send(Event::Close {
                force: options.force,
                reply,
            })
            .map_err(|_| ClientError::SessionClosed)?;
        result.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// Run one statement (plain text or a [`Query`](crate::sql::Query)).
    ///
    /// Statements the shell would read as directives are rejected before
    /// anything is sent: a leading `.`, or a later line starting with `.`
    /// once the SQL before it is complete (see [`is_directive`]).
    pub async fn run(&self, statement: impl AsRef<str>) -> Result<QueryResult, ClientError> {
        let statement = statement.as_ref();
        if self.state() != SessionState::Open {
            return Err(ClientError::SessionClosed);
        }
        if is_directive(statement) {
            return Err(ClientError::DirectiveRejected {
                statement: statement.to_string(),
            });
        }
        let Some(events) = &self.events else {
            return Err(ClientError::SessionClosed);
        };

        let (reply, result) = oneshot::channel();
        events
            .send(Event::Submit {
                statement: statement.to_string(),
                reply,
            })
            .map_err(|_| ClientError::SessionClosed)?;
        result.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// Run a statement and decode each row into `T`.
    pub async fn run_as<T: DeserializeOwned>(
        &self,
        statement: impl AsRef<str>,
    ) -> Result<Vec<T>, ClientError> {
        self.run(statement).await?.deserialize()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let Some(events) = self.events.take() else {
            return;
        };
        if self.running() {
            debug!("client dropped while running, killing shell");
            let (reply, _) = oneshot::channel();
            let _ = events.send(Event::Close { force: true, reply });
        }
    }
}
