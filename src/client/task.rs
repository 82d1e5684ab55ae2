//! Queued statements and their single-use result slots.

use tokio::sync::oneshot;
use tracing::debug;

use super::{ClientError, QueryResult};

/// Leading character of shell directives such as `.exit` or `.print`.
pub const DIRECTIVE_PREFIX: char = '.';

/// Directive asking the shell to exit.
pub const EXIT_DIRECTIVE: &str = ".exit";

/// Directive asking the shell to print its argument on stdout.
pub const PRINT_DIRECTIVE: &str = ".print";

pub(crate) type Reply = oneshot::Sender<Result<QueryResult, ClientError>>;

/// Where the directive scan currently is within the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Whether the shell would read any line of `statement` as a directive.
///
/// The shell treats a line starting with `.` as a directive whenever no
/// unfinished SQL precedes it, so later lines count as well as the first one.
/// Text inside quotes and comments is skipped. A `;` inside a trigger body is
/// taken as the end of a statement, which can only over-report.
pub fn is_directive(statement: &str) -> bool {
    let mut scan = Scan::Code;
    let mut unfinished = false;
    let mut line_start = true;
    let mut chars = statement.chars().peekable();

    while let Some(c) = chars.next() {
        if line_start && scan == Scan::Code && !unfinished && c == DIRECTIVE_PREFIX {
            return true;
        }
        line_start = c == '\n';

        scan = match (scan, c) {
            (Scan::Code, '\'' | '"' | '`') => {
                unfinished = true;
                Scan::Quoted(c)
            }
            (Scan::Code, '[') => {
                unfinished = true;
                Scan::Quoted(']')
            }
            (Scan::Code, '-') if chars.peek() == Some(&'-') => {
                chars.next();
                Scan::LineComment
            }
            (Scan::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                Scan::BlockComment
            }
            (Scan::Code, ';') => {
                unfinished = false;
                Scan::Code
            }
            (Scan::Code, c) => {
                if !c.is_whitespace() {
                    unfinished = true;
                }
                Scan::Code
            }
            (Scan::Quoted(close), c) if c == close => Scan::Code,
            (Scan::LineComment, '\n') => Scan::Code,
            (Scan::BlockComment, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::Code
            }
            (scan, _) => scan,
        };
    }
    false
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Statement {
    Sql(String),
    Exit,
}

impl Statement {
    pub fn text(&self) -> &str {
        match self {
            Statement::Sql(sql) => sql,
            Statement::Exit => EXIT_DIRECTIVE,
        }
    }

    /// Render the statement followed by the sentinel print request.
    ///
    /// Directives are line-terminated; plain statements also get a `;`.
    pub fn render(&self, sentinel: &str) -> String {
        let text = self.text();
        let terminator = if is_directive(text) { "" } else { ";" };
        format!("{}{}\n{} {}", text, terminator, PRINT_DIRECTIVE, sentinel)
    }
}

/// A statement waiting for, or holding, the shell.
#[derive(Debug)]
pub(crate) struct Task {
    pub id: u64,
    pub statement: Statement,
    reply: Option<Reply>,
}

impl Task {
    pub fn new(id: u64, statement: String, reply: Reply) -> Self {
        Self {
            id,
            statement: Statement::Sql(statement),
            reply: Some(reply),
        }
    }

    /// The internal shutdown task; its outcome is reported to close waiters instead.
    pub fn shutdown(id: u64) -> Self {
        Self {
            id,
            statement: Statement::Exit,
            reply: None,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.statement == Statement::Exit
    }

    /// Fulfil the task's result slot. Consumes the task so it happens once.
    pub fn resolve(self, result: Result<QueryResult, ClientError>) {
        let Some(reply) = self.reply else { return };
        if reply.send(result).is_err() {
            debug!(task = self.id, "caller dropped before result was delivered");
        }
    }
}
