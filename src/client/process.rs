//! Shell subprocess supervision.
//!
//! The child's pipes are owned by small tasks that translate I/O into
//! [`Event`]s for the session actor:
//! - a writer task drains statement text into stdin
//! - one reader task forwards raw chunks from stdout and stderr, stderr first
//! - an exit watcher reports the exit code once the reader hits end-of-stream
//!   on both pipes

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::Event;
use super::{ClientError, ClientOptions};

/// Flag enabling column headers.
pub const HEADER_FLAG: &str = "-header";

/// Flag enabling row-as-object JSON output.
pub const JSON_FLAG: &str = "-json";

/// Exit code reported when the shell was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Input side of the shell as seen by the session.
///
/// Writes are fire-and-forget: a broken pipe surfaces later as an exit event.
pub(crate) trait ShellInput {
    /// Queue text for the shell's stdin.
    fn write(&mut self, text: String);

    /// Close stdin. Later writes are dropped.
    fn close(&mut self);

    /// Ask the process to terminate.
    fn kill(&mut self);
}

/// [`ShellInput`] backed by a running child process.
#[derive(Debug)]
pub(crate) struct ProcessInput {
    stdin: Option<mpsc::UnboundedSender<String>>,
    kill: Option<oneshot::Sender<()>>,
}

impl ShellInput for ProcessInput {
    fn write(&mut self, text: String) {
        let Some(stdin) = &self.stdin else {
            warn!("shell input already closed, dropping write");
            return;
        };
        if stdin.send(text).is_err() {
            warn!("shell input writer stopped, dropping write");
        }
    }

    fn close(&mut self) {
        self.stdin = None;
    }

    fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Build the launch command for the configured shell.
pub(crate) fn shell_command(options: &ClientOptions) -> Command {
    let mut command = Command::new(&options.bin);
    command
        .arg(&options.path)
        .arg(HEADER_FLAG)
        .arg(JSON_FLAG)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Launch the shell and wire its pipes to `events`.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn(
    options: &ClientOptions,
    events: mpsc::UnboundedSender<Event>,
) -> Result<ProcessInput, ClientError> {
    let launch_failed = |message: String| ClientError::LaunchFailed {
        bin: options.bin.display().to_string(),
        message,
    };

    let mut child = shell_command(options)
        .spawn()
        .map_err(|e| launch_failed(e.to_string()))?;

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(launch_failed("shell pipes were not captured".to_string()));
    };

    info!(
        pid = child.id(),
        bin = %options.bin.display(),
        path = %options.path,
        "launched shell"
    );

    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_input(stdin, stdin_rx));

    let reader = tokio::spawn(read_outputs(stdout, stderr, events.clone()));

    let (kill_tx, kill_rx) = oneshot::channel();
    tokio::spawn(watch_exit(child, kill_rx, reader, events));

    Ok(ProcessInput {
        stdin: Some(stdin_tx),
        kill: Some(kill_tx),
    })
}

/// Copy queued text into stdin until the session closes the channel.
async fn write_input(mut stdin: ChildStdin, mut input: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = input.recv().await {
        let written = match stdin.write_all(text.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(error = %e, "failed to write to shell stdin");
            break;
        }
    }
    debug!("shell stdin closed");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward chunks from both output pipes as events until both are at end-of-stream.
///
/// Stderr is polled first whenever both pipes are readable. The shell writes a
/// diagnostic before it prints the sentinel queued behind the failing
/// statement, so the diagnostic always reaches the session ahead of it.
async fn read_outputs<O, E>(mut stdout: O, mut stderr: E, events: mpsc::UnboundedSender<Event>)
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = vec![0u8; READ_BUFFER_SIZE];
    let mut err_buf = vec![0u8; READ_BUFFER_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let (stream, read) = tokio::select! {
            biased;
            read = stderr.read(&mut err_buf), if err_open => (Stream::Stderr, read),
            read = stdout.read(&mut out_buf), if out_open => (Stream::Stdout, read),
        };

        let event = match (stream, read) {
            (Stream::Stderr, Ok(n)) if n > 0 => Event::Stderr(err_buf[..n].to_vec()),
            (Stream::Stdout, Ok(n)) if n > 0 => Event::Stdout(out_buf[..n].to_vec()),
            (stream, result) => {
                if let Err(e) = result {
                    warn!(?stream, error = %e, "failed to read shell output");
                }
                debug!(?stream, "shell output reached end of stream");
                match stream {
                    Stream::Stdout => out_open = false,
                    Stream::Stderr => err_open = false,
                }
                continue;
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
}

/// Wait for the child to exit (killing it on request) and report the exit code.
async fn watch_exit(
    mut child: Child,
    mut kill: oneshot::Receiver<()>,
    reader: JoinHandle<()>,
    events: mpsc::UnboundedSender<Event>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut kill => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill shell");
            }
            child.wait().await
        }
    };

    let _ = reader.await;

    let code = match status {
        Ok(status) => status.code().unwrap_or(SIGNAL_EXIT_CODE),
        Err(e) => {
            warn!(error = %e, "failed to wait for shell exit");
            SIGNAL_EXIT_CODE
        }
    };
    info!(code, "shell exited");
    let _ = events.send(Event::Exited(code));
}
