//! Session state machine for one shell process.
//!
//! All mutable state lives in [`Session`], which is owned by a single actor
//! task ([`drive`]). Callers and the process supervisor only talk to it
//! through [`Event`]s, so handlers never run concurrently.
//!
//! # Processing steps
//!
//! The actor waits for one event, then handles every event already queued,
//! and only then commits a pending stdout completion. A diagnostic that lands
//! in the same step as the sentinel for the same task therefore always wins.
//! Across steps, the process reader delivers a diagnostic ahead of the
//! sentinel that follows it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::framer::OutputFramer;
use super::process::ShellInput;
use super::task::{Reply, Task, is_directive};
use super::{ClientError, QueryResult};

pub(crate) type CloseReply = oneshot::Sender<Result<i32, ClientError>>;

/// Exit code synthesized by a forced close.
pub const FORCED_EXIT_CODE: i32 = 0;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Unopened = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Unopened,
            1 => SessionState::Open,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Lifecycle readable from the client while the actor owns the session.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(SessionState::Unopened as u8)))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless that would go backwards.
    fn advance_to(&self, next: SessionState) {
        self.0.fetch_max(next as u8, Ordering::AcqRel);
    }
}

/// Everything the session actor reacts to.
#[derive(Debug)]
pub(crate) enum Event {
    Submit { statement: String, reply: Reply },
    Close { force: bool, reply: CloseReply },
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exited(i32),
}

pub(crate) struct Session<I: ShellInput> {
    input: I,
    state: Arc<SharedState>,
    framer: OutputFramer,
    current: Option<Task>,
    queue: VecDeque<Task>,
    close_waiters: Vec<CloseReply>,
    next_id: u64,
    exited: bool,
}

impl<I: ShellInput> Session<I> {
    /// Start a session over an already launched shell.
    pub fn new(input: I, state: Arc<SharedState>, framer: OutputFramer) -> Self {
        state.advance_to(SessionState::Open);
        Self {
            input,
            state,
            framer,
            current: None,
            queue: VecDeque::new(),
            close_waiters: Vec::new(),
            next_id: 0,
            exited: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// The process exit has been observed; nothing else can happen.
    pub fn is_finished(&self) -> bool {
        self.exited
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Submit { statement, reply } => self.submit(statement, reply),
            Event::Close { force, reply } => self.close(force, reply),
            Event::Stdout(chunk) => self.on_stdout(&chunk),
            Event::Stderr(chunk) => self.on_stderr(&chunk),
            Event::Exited(code) => self.on_exit(code),
        }
    }

    /// End of a processing step: commit a tentative stdout completion.
    pub fn commit(&mut self) {
        let Some((task, payload)) = self.take_completed() else {
            return;
        };

        self.advance();
        debug!(task = task.id, bytes = payload.len(), "statement completed");
        task.resolve(QueryResult::parse(&payload));
    }

    /// Detach the current task if its complete response is buffered.
    fn take_completed(&mut self) -> Option<(Task, Vec<u8>)> {
        let current_id = self.current.as_ref().map(|task| task.id);
        let payload = self.framer.take_completion(current_id)?;
        let task = self.current.take()?;
        Some((task, payload))
    }

    fn submit(&mut self, statement: String, reply: Reply) {
        if self.state() != SessionState::Open {
            let _ = reply.send(Err(ClientError::SessionClosed));
            return;
        }
        if is_directive(&statement) {
            let _ = reply.send(Err(ClientError::DirectiveRejected { statement }));
            return;
        }

        let id = self.next_task_id();
        self.enqueue(Task::new(id, statement, reply));
    }

    fn close(&mut self, force: bool, reply: CloseReply) {
        match (self.state(), force) {
            (SessionState::Closed, _) | (SessionState::Unopened, _) => {
                let _ = reply.send(Err(ClientError::SessionClosed));
            }
            (_, true) => {
                debug!("force closing shell");
                self.input.close();
                self.input.kill();
                self.finalize(FORCED_EXIT_CODE);
                let _ = reply.send(Ok(FORCED_EXIT_CODE));
            }
            (SessionState::Open, false) => {
                debug!(queued = self.queue.len(), "closing shell after queued statements");
                self.state.advance_to(SessionState::Closing);
                self.close_waiters.push(reply);
                let id = self.next_task_id();
                self.enqueue(Task::shutdown(id));
            }
            (SessionState::Closing, false) => {
                self.close_waiters.push(reply);
            }
        }
    }

    fn on_stdout(&mut self, chunk: &[u8]) {
        let current_id = self.current.as_ref().map(|task| task.id);
        self.framer.push(chunk, current_id);

        if current_id.is_none() {
            let dropped = self.framer.discard_stray();
            if dropped > 0 {
                warn!(bytes = dropped, "discarding shell output with no statement in flight");
            }
        }
    }

    fn on_stderr(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        let Some(task) = self.current.take() else {
            warn!(diagnostic = %text.trim_end(), "shell diagnostic with no statement in flight");
            return;
        };

        self.framer.fail_current();
        self.advance();

        let message = diagnostic_message(&text);
        debug!(task = task.id, %message, "statement failed");
        task.resolve(Err(ClientError::Statement { message }));
    }

    fn on_exit(&mut self, code: i32) {
        self.exited = true;
        if self.state() == SessionState::Closed {
            return;
        }

        // Output that finished before the exit still belongs to its statement.
        if let Some((task, payload)) = self.take_completed() {
            debug!(task = task.id, "statement completed as shell exited");
            task.resolve(QueryResult::parse(&payload));
        }
        self.finalize(code);
    }

    /// Settle the shutdown waiters and abandon every outstanding task.
    fn finalize(&mut self, code: i32) {
        self.state.advance_to(SessionState::Closed);
        self.input.close();
        self.framer.clear();

        let waiters = std::mem::take(&mut self.close_waiters);
        let mut abandoned = std::mem::take(&mut self.queue);

        let outcome = match self.current.take() {
            Some(task) if task.is_shutdown() => Ok(code),
            Some(task) => {
                abandoned.push_front(task);
                Err(ClientError::UnexpectedExit { code })
            }
            None => Err(ClientError::UnexpectedExit { code }),
        };

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        if !abandoned.is_empty() {
            warn!(count = abandoned.len(), "abandoning statements on closed session");
        }
        for task in abandoned {
            task.resolve(Err(ClientError::SessionClosed));
        }
    }

    /// Dispatch immediately when idle, otherwise append to the queue.
    fn enqueue(&mut self, task: Task) {
        if self.current.is_none() {
            self.dispatch(task);
        } else {
            self.queue.push_back(task);
        }
    }

    fn dispatch(&mut self, task: Task) {
        debug!(task = task.id, statement = task.statement.text(), "dispatching");
        self.input.write(task.statement.render(self.framer.sentinel()));
        self.current = Some(task);
    }

    fn advance(&mut self) {
        if let Some(task) = self.queue.pop_front() {
            self.dispatch(task);
        }
    }

    fn next_task_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    #[cfg(test)]
    pub fn input(&self) -> &I {
        &self.input
    }

    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn current_statement(&self) -> Option<&str> {
        self.current.as_ref().map(|task| task.statement.text())
    }
}

/// Strip the `<location>: ` prefix from a diagnostic line.
pub fn diagnostic_message(diagnostic: &str) -> String {
    let message = match diagnostic.find(": ") {
        Some(idx) => &diagnostic[idx + 2..],
        None => diagnostic,
    };
    message.trim_end().to_string()
}

/// Run the session until the shell process has exited.
pub(crate) async fn drive<I: ShellInput>(
    mut session: Session<I>,
    mut events: mpsc::UnboundedReceiver<Event>,
) {
    while let Some(event) = events.recv().await {
        session.handle(event);
        drain_ready(&mut session, &mut events);
        session.commit();
        if session.is_finished() {
            break;
        }
    }
    debug!("session actor stopped");
}

fn drain_ready<I: ShellInput>(session: &mut Session<I>, events: &mut mpsc::UnboundedReceiver<Event>) {
    while let Ok(event) = events.try_recv() {
        session.handle(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingInput, SENTINEL, recording_session, rows};
    use rstest::{fixture, rstest};
    use serde_json::json;

    type Pending = oneshot::Receiver<Result<QueryResult, ClientError>>;
    type PendingClose = oneshot::Receiver<Result<i32, ClientError>>;

    #[fixture]
    fn session() -> Session<RecordingInput> {
        recording_session()
    }

    fn submit(session: &mut Session<RecordingInput>, statement: &str) -> Pending {
        let (reply, rx) = oneshot::channel();
        session.handle(Event::Submit {
            statement: statement.to_string(),
            reply,
        });
        rx
    }

    fn close(session: &mut Session<RecordingInput>, force: bool) -> PendingClose {
        let (reply, rx) = oneshot::channel();
        session.handle(Event::Close { force, reply });
        rx
    }

    /// Deliver one event as its own processing step.
    fn step(session: &mut Session<RecordingInput>, event: Event) {
        session.handle(event);
        session.commit();
    }

    fn stdout(text: &str) -> Event {
        Event::Stdout(text.as_bytes().to_vec())
    }

    fn stderr(text: &str) -> Event {
        Event::Stderr(text.as_bytes().to_vec())
    }

    fn sentinel() -> Event {
        stdout(SENTINEL)
    }

    // =========================================================================
    // Dispatch and serialization
    // =========================================================================

    #[rstest]
    fn test_open_session_state(session: Session<RecordingInput>) {
        assert_eq!(session.state(), SessionState::Open);
    }

    #[rstest]
    fn test_first_submit_is_written_with_sentinel(mut session: Session<RecordingInput>) {
        let _rx = submit(&mut session, "SELECT 1 AS x");
        assert_eq!(
            session.input().writes(),
            vec![format!("SELECT 1 AS x;\n.print {}", SENTINEL)]
        );
        assert_eq!(session.current_statement(), Some("SELECT 1 AS x"));
    }

    #[rstest]
    fn test_later_submits_wait_in_queue(mut session: Session<RecordingInput>) {
        let _a = submit(&mut session, "SELECT 1");
        let _b = submit(&mut session, "SELECT 2");
        let _c = submit(&mut session, "SELECT 3");
        assert_eq!(session.input().writes().len(), 1);
        assert_eq!(session.queued(), 2);
    }

    #[rstest]
    fn test_results_delivered_in_submission_order(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT 1 AS x");
        let mut b = submit(&mut session, "SELECT 2 AS x");

        step(&mut session, stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        assert_eq!(a.try_recv().unwrap().unwrap(), rows(json!([{"x": 1}])));
        assert!(b.try_recv().is_err());
        assert_eq!(session.current_statement(), Some("SELECT 2 AS x"));

        step(&mut session, stdout(&format!("[{{\"x\":2}}]\n{}", SENTINEL)));
        assert_eq!(b.try_recv().unwrap().unwrap(), rows(json!([{"x": 2}])));
        assert_eq!(session.current_statement(), None);
        assert_eq!(session.input().writes().len(), 2);
    }

    #[rstest]
    fn test_statement_without_rows_is_empty(mut session: Session<RecordingInput>) {
        let mut rx = submit(&mut session, "CREATE TABLE t (id INTEGER)");
        step(&mut session, sentinel());
        assert_eq!(rx.try_recv().unwrap().unwrap(), QueryResult::Empty);
    }

    #[rstest]
    fn test_output_split_over_many_events(mut session: Session<RecordingInput>) {
        let mut rx = submit(&mut session, "SELECT 'é' AS v");
        let full = format!("[{{\"v\":\"é\"}}]\n{}", SENTINEL);
        for byte in full.as_bytes() {
            step(&mut session, Event::Stdout(vec![*byte]));
        }
        assert_eq!(rx.try_recv().unwrap().unwrap(), rows(json!([{"v": "é"}])));
    }

    #[rstest]
    fn test_directive_rejected(mut session: Session<RecordingInput>) {
        let mut rx = submit(&mut session, ".tables");
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(ClientError::DirectiveRejected { .. })
        ));
        assert!(session.input().writes().is_empty());
    }

    #[rstest]
    fn test_directive_after_complete_statement_rejected(mut session: Session<RecordingInput>) {
        let mut rx = submit(&mut session, "SELECT 1;\n.shell ls");
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(ClientError::DirectiveRejected { .. })
        ));
        assert!(session.input().writes().is_empty());
    }

    #[rstest]
    fn test_malformed_output_fails_only_that_task(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT broken");
        let mut b = submit(&mut session, "SELECT 1 AS x");
        step(&mut session, stdout(&format!("oops\n{}", SENTINEL)));
        assert!(matches!(
            a.try_recv().unwrap(),
            Err(ClientError::MalformedOutput { .. })
        ));
        step(&mut session, stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        assert!(b.try_recv().unwrap().is_ok());
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    #[rstest]
    fn test_diagnostic_fails_current_and_advances(mut session: Session<RecordingInput>) {
        let mut bad = submit(&mut session, "BADSQL");
        let mut good = submit(&mut session, "SELECT 1 AS x");

        step(
            &mut session,
            stderr("Parse error near line 1: near \"BADSQL\": syntax error\n"),
        );
        match bad.try_recv().unwrap() {
            Err(ClientError::Statement { message }) => {
                assert_eq!(message, "near \"BADSQL\": syntax error");
            }
            other => panic!("Expected statement error, got {:?}", other),
        }
        assert_eq!(session.current_statement(), Some("SELECT 1 AS x"));

        // The failed statement's sentinel arrives late and is discarded.
        step(&mut session, sentinel());
        assert!(good.try_recv().is_err());

        step(&mut session, stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        assert_eq!(good.try_recv().unwrap().unwrap(), rows(json!([{"x": 1}])));
        assert_eq!(session.state(), SessionState::Open);
    }

    #[rstest]
    fn test_diagnostic_wins_over_sentinel_in_same_step(mut session: Session<RecordingInput>) {
        let mut bad = submit(&mut session, "BADSQL");
        let mut next = submit(&mut session, "CREATE TABLE t (id)");

        session.handle(sentinel());
        session.handle(stderr("Error: near line 1: boom"));
        session.commit();

        assert!(matches!(
            bad.try_recv().unwrap(),
            Err(ClientError::Statement { .. })
        ));
        assert!(next.try_recv().is_err());

        step(&mut session, sentinel());
        assert_eq!(next.try_recv().unwrap().unwrap(), QueryResult::Empty);
    }

    #[rstest]
    fn test_diagnostic_then_sentinel_in_same_step(mut session: Session<RecordingInput>) {
        let mut bad = submit(&mut session, "BADSQL");
        let mut next = submit(&mut session, "CREATE TABLE t (id)");

        session.handle(stderr("Error: boom"));
        session.handle(sentinel());
        session.commit();

        assert!(bad.try_recv().unwrap().is_err());
        assert!(next.try_recv().is_err());

        step(&mut session, sentinel());
        assert_eq!(next.try_recv().unwrap().unwrap(), QueryResult::Empty);
    }

    #[rstest]
    fn test_stray_diagnostic_is_ignored(mut session: Session<RecordingInput>) {
        step(&mut session, stderr("Error: nothing running"));
        assert_eq!(session.state(), SessionState::Open);
        let mut rx = submit(&mut session, "SELECT 1 AS x");
        step(&mut session, stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[rstest]
    #[case("Parse error near line 1: no such table: t\n", "no such table: t")]
    #[case("Error: in prepare, x\n", "in prepare, x")]
    #[case("no delimiter here\n", "no delimiter here")]
    fn test_diagnostic_message(#[case] diagnostic: &str, #[case] expected: &str) {
        assert_eq!(diagnostic_message(diagnostic), expected);
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    #[rstest]
    fn test_graceful_close_drains_queue_first(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT 1 AS x");
        let mut closed = close(&mut session, false);
        assert_eq!(session.state(), SessionState::Closing);

        let mut late = submit(&mut session, "SELECT 2");
        assert!(matches!(late.try_recv().unwrap(), Err(ClientError::SessionClosed)));

        step(&mut session, stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        assert!(a.try_recv().unwrap().is_ok());
        assert_eq!(session.current_statement(), Some(".exit"));
        assert!(closed.try_recv().is_err());

        let writes = session.input().writes();
        assert_eq!(writes.last().unwrap(), &format!(".exit\n.print {}", SENTINEL));

        step(&mut session, Event::Exited(0));
        assert_eq!(closed.try_recv().unwrap().unwrap(), 0);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_finished());
        assert!(session.input().is_closed());
    }

    #[rstest]
    fn test_close_when_idle_writes_exit_immediately(mut session: Session<RecordingInput>) {
        let mut closed = close(&mut session, false);
        assert_eq!(session.current_statement(), Some(".exit"));
        step(&mut session, Event::Exited(3));
        assert_eq!(closed.try_recv().unwrap().unwrap(), 3);
    }

    #[rstest]
    fn test_repeated_close_shares_outcome(mut session: Session<RecordingInput>) {
        let mut first = close(&mut session, false);
        let mut second = close(&mut session, false);
        let exits = session
            .input()
            .writes()
            .iter()
            .filter(|w| w.starts_with(".exit"))
            .count();
        assert_eq!(exits, 1);

        step(&mut session, Event::Exited(0));
        assert_eq!(first.try_recv().unwrap().unwrap(), 0);
        assert_eq!(second.try_recv().unwrap().unwrap(), 0);
    }

    #[rstest]
    fn test_force_close_abandons_everything(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT slow");
        let mut b = submit(&mut session, "SELECT 2");
        let mut forced = close(&mut session, true);

        assert_eq!(forced.try_recv().unwrap().unwrap(), 0);
        assert!(matches!(a.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        assert!(matches!(b.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.input().is_closed());
        assert!(session.input().is_killed());
        assert!(!session.is_finished());

        // The real exit notification arrives later and changes nothing.
        step(&mut session, Event::Exited(-1));
        assert!(session.is_finished());
    }

    #[rstest]
    fn test_force_close_during_graceful_close(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT slow");
        let mut graceful = close(&mut session, false);
        let mut forced = close(&mut session, true);

        assert_eq!(forced.try_recv().unwrap().unwrap(), 0);
        assert!(matches!(
            graceful.try_recv().unwrap(),
            Err(ClientError::UnexpectedExit { code: 0 })
        ));
        assert!(matches!(a.try_recv().unwrap(), Err(ClientError::SessionClosed)));
    }

    #[rstest]
    fn test_unexpected_exit_fails_current_and_queue(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT 1");
        let mut b = submit(&mut session, "SELECT 2");
        step(&mut session, Event::Exited(1));

        assert!(matches!(a.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        assert!(matches!(b.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[rstest]
    fn test_unexpected_exit_while_closing(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT 1");
        let mut closed = close(&mut session, false);
        step(&mut session, Event::Exited(139));

        assert!(matches!(
            closed.try_recv().unwrap(),
            Err(ClientError::UnexpectedExit { code: 139 })
        ));
        assert!(matches!(a.try_recv().unwrap(), Err(ClientError::SessionClosed)));
    }

    #[rstest]
    fn test_exit_in_same_step_keeps_finished_result(mut session: Session<RecordingInput>) {
        let mut a = submit(&mut session, "SELECT 1 AS x");
        let mut b = submit(&mut session, "SELECT 2 AS x");
        let mut closed = close(&mut session, false);

        session.handle(stdout(&format!("[{{\"x\":1}}]\n{}", SENTINEL)));
        session.handle(Event::Exited(2));
        session.commit();

        assert_eq!(a.try_recv().unwrap().unwrap(), rows(json!([{"x": 1}])));
        assert!(matches!(b.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        assert!(matches!(
            closed.try_recv().unwrap(),
            Err(ClientError::UnexpectedExit { code: 2 })
        ));
        // The next statement was never written to the dead shell.
        assert_eq!(session.input().writes().len(), 1);
    }

    #[rstest]
    fn test_close_after_closed_is_rejected(mut session: Session<RecordingInput>) {
        let _ = close(&mut session, true);
        let mut again = close(&mut session, false);
        assert!(matches!(again.try_recv().unwrap(), Err(ClientError::SessionClosed)));
        let mut forced_again = close(&mut session, true);
        assert!(matches!(
            forced_again.try_recv().unwrap(),
            Err(ClientError::SessionClosed)
        ));
    }

    #[rstest]
    fn test_submit_after_closed_is_rejected(mut session: Session<RecordingInput>) {
        step(&mut session, Event::Exited(0));
        let mut rx = submit(&mut session, "SELECT 1");
        assert!(matches!(rx.try_recv().unwrap(), Err(ClientError::SessionClosed)));
    }

    #[rstest]
    fn test_state_never_moves_backwards() {
        let state = SharedState::new();
        state.advance_to(SessionState::Closed);
        state.advance_to(SessionState::Open);
        assert_eq!(state.get(), SessionState::Closed);
    }

    // =========================================================================
    // Actor loop
    // =========================================================================

    #[tokio::test]
    async fn test_drive_commits_after_draining_step() {
        let session = recording_session();
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply, result) = oneshot::channel();

        tx.send(Event::Submit {
            statement: "BADSQL".to_string(),
            reply,
        })
        .unwrap();
        tx.send(sentinel()).unwrap();
        tx.send(stderr("Error: near line 1: bad")).unwrap();
        tx.send(Event::Exited(1)).unwrap();

        drive(session, rx).await;
        assert!(matches!(
            result.await.unwrap(),
            Err(ClientError::Statement { .. })
        ));
    }
}
