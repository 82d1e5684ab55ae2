//! Framing of the shell's stdout into one response per statement.
//!
//! After every statement the session asks the shell to print a sentinel line.
//! The framer accumulates raw bytes and reports a completion once the buffer
//! ends with that line. Matching is two-phase: [`OutputFramer::push`] only
//! records a tentative match for the current task, and
//! [`OutputFramer::take_completion`] commits it at the end of a processing
//! step, after any diagnostic for the same task had its chance to win.
//!
//! The shell keeps reading input after a failed statement, so the sentinel
//! queued behind it is still printed. When a statement fails before its
//! sentinel was seen, that sentinel is owed and gets discarded when it shows
//! up at the head of the buffer.

use crate::utils::generate_token;

/// Fixed prefix marking a line as an end-of-output sentinel.
pub const SENTINEL_PREFIX: &str = "-- eoq ";

/// Build the sentinel line (including its line break) for a token.
pub fn sentinel_line(token: &str) -> String {
    format!("{}{}\n", SENTINEL_PREFIX, token)
}

#[derive(Debug)]
pub(crate) struct OutputFramer {
    sentinel: String,
    buffer: Vec<u8>,
    pending: Option<u64>,
    owed: usize,
}

impl OutputFramer {
    pub fn new(sentinel: String) -> Self {
        Self {
            sentinel,
            buffer: Vec::new(),
            pending: None,
            owed: 0,
        }
    }

    /// Framer with a freshly generated session token.
    pub fn generate() -> Self {
        Self::new(sentinel_line(&generate_token()))
    }

    /// The sentinel line, line break included.
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Append a stdout chunk and tentatively match the sentinel for `current`.
    pub fn push(&mut self, chunk: &[u8], current: Option<u64>) {
        self.buffer.extend_from_slice(chunk);
        self.discard_owed();

        self.pending = match current {
            Some(id) if self.ends_with_sentinel() => Some(id),
            _ => None,
        };
    }

    /// Commit a tentative match if it still belongs to `current`.
    ///
    /// Returns the response payload (sentinel stripped) and clears the buffer.
    pub fn take_completion(&mut self, current: Option<u64>) -> Option<Vec<u8>> {
        let pending = self.pending.take()?;
        if current != Some(pending) || !self.ends_with_sentinel() {
            return None;
        }

        let payload_len = self.buffer.len() - self.sentinel.len();
        self.buffer.truncate(payload_len);
        // Any sentinel still owed would have been at the head of this payload.
        self.owed = 0;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Drop buffered output because the current task failed.
    pub fn fail_current(&mut self) {
        if !self.ends_with_sentinel() {
            self.owed += 1;
        }
        self.clear();
    }

    /// Drop output that arrived while no task was current.
    ///
    /// A partial owed sentinel is kept so the rest of it can be discarded.
    /// Returns the number of bytes dropped.
    pub fn discard_stray(&mut self) -> usize {
        if self.owed > 0 && self.sentinel.as_bytes().starts_with(&self.buffer) {
            return 0;
        }
        let dropped = self.buffer.len();
        self.clear();
        dropped
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending = None;
    }

    fn ends_with_sentinel(&self) -> bool {
        self.buffer.ends_with(self.sentinel.as_bytes())
    }

    fn discard_owed(&mut self) {
        while self.owed > 0 && self.buffer.starts_with(self.sentinel.as_bytes()) {
            self.buffer.drain(..self.sentinel.len());
            self.owed -= 1;
        }
    }
}
