//! Nested interactive input consumers.
//!
//! A session dispatches console input to the reader on top of its
//! [`InputReaderStack`]. Pushing a reader deactivates the previous top;
//! finishing a reader pops it and reactivates the one below. With no reader
//! on the stack, input is collected into lines for the command interpreter.
//!
//! Stack operations return the notifications to deliver instead of calling
//! reader callbacks directly, so callbacks never run under the session lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Notification delivered to an input reader callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputReaderAction {
    /// The reader became the top of the stack.
    Activate,
    /// The reader is the top again after the reader above it finished.
    Reactivate,
    /// Another reader was pushed above this one.
    Deactivate,
    /// A token of input is available.
    GotToken,
    /// The user interrupted input.
    Interrupt,
    /// Input reached end of file.
    EndOfFile,
    /// The reader is finished and has been popped.
    Done,
}

/// How dispatched bytes are split into tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    /// One token per byte.
    Byte,
    /// One token per whitespace-separated word.
    Word,
    /// One token per line, without the line terminator.
    #[default]
    Line,
    /// Every dispatch is one token.
    All,
}

/// Callback invoked with each notification. Returns the number of bytes
/// consumed from the token.
pub type InputReaderCallback = Arc<dyn Fn(InputReaderAction, &[u8]) -> usize + Send + Sync>;

struct ReaderInner {
    callback: InputReaderCallback,
    granularity: Granularity,
    end_token: Option<Vec<u8>>,
    prompt: Option<String>,
    echo: bool,
    active: AtomicBool,
    done: AtomicBool,
    pending: Mutex<Vec<u8>>,
}

/// An interactive input consumer.
///
/// Clones refer to the same reader.
#[derive(Clone)]
pub struct InputReader {
    inner: Arc<ReaderInner>,
}

impl InputReader {
    /// Start building a reader around a callback.
    pub fn builder<F>(callback: F) -> InputReaderBuilder
    where
        F: Fn(InputReaderAction, &[u8]) -> usize + Send + Sync + 'static,
    {
        InputReaderBuilder {
            callback: Arc::new(callback),
            granularity: Granularity::default(),
            end_token: None,
            prompt: None,
            echo: true,
        }
    }

    /// The token granularity.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.inner.granularity
    }

    /// The prompt shown while this reader is on top.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.inner.prompt.as_deref()
    }

    /// Whether dispatched input is echoed to the session output.
    #[must_use]
    pub fn echo(&self) -> bool {
        self.inner.echo
    }

    /// Whether the reader is currently on top of a stack.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Whether the reader has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Mark the reader finished. It is popped on the next dispatch.
    pub fn set_done(&self) {
        self.inner.done.store(true, Ordering::Release);
    }

    /// Check if both values refer to the same reader.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn notify(&self, action: InputReaderAction) -> usize {
        match action {
            InputReaderAction::Activate | InputReaderAction::Reactivate => {
                self.inner.active.store(true, Ordering::Release);
            }
            InputReaderAction::Deactivate => {
                self.inner.active.store(false, Ordering::Release);
            }
            InputReaderAction::Done => {
                self.inner.active.store(false, Ordering::Release);
                self.inner.done.store(true, Ordering::Release);
            }
            _ => {}
        }
        (self.inner.callback)(action, &[])
    }

    fn token(&self, token: &[u8]) -> usize {
        if self
            .inner
            .end_token
            .as_deref()
            .is_some_and(|end| end == token)
        {
            self.set_done();
            return token.len();
        }
        (self.inner.callback)(InputReaderAction::GotToken, token)
    }

    /// Split bytes into tokens and deliver them until the reader is done.
    pub(crate) fn consume(&self, data: &[u8]) {
        match self.inner.granularity {
            Granularity::Byte => {
                for byte in data {
                    if self.is_done() {
                        break;
                    }
                    self.token(std::slice::from_ref(byte));
                }
            }
            Granularity::All => {
                let mut pending = self.pending_buffer();
                pending.extend_from_slice(data);
                let chunk = std::mem::take(&mut *pending);
                drop(pending);
                let used = self.token(&chunk).min(chunk.len());
                if !self.is_done() && used < chunk.len() {
                    self.pending_buffer().extend_from_slice(&chunk[used..]);
                }
            }
            Granularity::Line => {
                for line in self.split_pending(data, |b| b == b'\n') {
                    if self.is_done() {
                        break;
                    }
                    let line = line.strip_suffix(b"\r").unwrap_or(&line);
                    self.token(line);
                }
            }
            Granularity::Word => {
                for word in self.split_pending(data, |b| b.is_ascii_whitespace()) {
                    if self.is_done() {
                        break;
                    }
                    if !word.is_empty() {
                        self.token(&word);
                    }
                }
            }
        }
    }

    fn pending_buffer(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the partial token and return every complete one.
    fn split_pending(&self, data: &[u8], is_separator: impl Fn(u8) -> bool) -> Vec<Vec<u8>> {
        let mut pending = self.pending_buffer();
        pending.extend_from_slice(data);
        let mut tokens = Vec::new();
        while let Some(pos) = pending.iter().position(|&b| is_separator(b)) {
            let mut token: Vec<u8> = pending.drain(..=pos).collect();
            token.pop();
            tokens.push(token);
        }
        tokens
    }
}

impl fmt::Debug for InputReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputReader")
            .field("granularity", &self.inner.granularity)
            .field("prompt", &self.inner.prompt)
            .field("active", &self.is_active())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Builder for [`InputReader`].
pub struct InputReaderBuilder {
    callback: InputReaderCallback,
    granularity: Granularity,
    end_token: Option<Vec<u8>>,
    prompt: Option<String>,
    echo: bool,
}

impl InputReaderBuilder {
    /// Set the token granularity.
    #[must_use]
    pub const fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Finish the reader when this token is read.
    #[must_use]
    pub fn end_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.end_token = Some(token.into());
        self
    }

    /// Set the prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Enable or disable echo.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Build the reader.
    #[must_use]
    pub fn build(self) -> InputReader {
        InputReader {
            inner: Arc::new(ReaderInner {
                callback: self.callback,
                granularity: self.granularity,
                end_token: self.end_token,
                prompt: self.prompt,
                echo: self.echo,
                active: AtomicBool::new(false),
                done: AtomicBool::new(false),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Notifications to deliver after releasing the stack.
pub(crate) type Notifications = Vec<(InputReader, InputReaderAction)>;

/// Deliver notifications in order.
pub(crate) fn deliver(notifications: Notifications) {
    for (reader, action) in notifications {
        reader.notify(action);
    }
}

/// A session's reader stack plus the line buffer used when it is empty.
#[derive(Debug, Default)]
pub(crate) struct InputReaderStack {
    readers: Vec<InputReader>,
    pending_line: Vec<u8>,
}

impl InputReaderStack {
    pub(crate) fn push(&mut self, reader: InputReader) -> Notifications {
        let mut notes = Vec::with_capacity(2);
        if let Some(previous) = self.readers.last() {
            notes.push((previous.clone(), InputReaderAction::Deactivate));
        }
        notes.push((reader.clone(), InputReaderAction::Activate));
        self.readers.push(reader);
        notes
    }

    pub(crate) fn top(&self) -> Option<InputReader> {
        self.readers.last().cloned()
    }

    pub(crate) fn is_top(&self, reader: &InputReader) -> bool {
        self.readers.last().is_some_and(|top| top.same_as(reader))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Route an action to the top reader. `Done` pops it.
    pub(crate) fn notify_top(&mut self, action: InputReaderAction) -> Notifications {
        if action == InputReaderAction::Done {
            return self.pop_top();
        }
        self.readers
            .last()
            .map(|top| vec![(top.clone(), action)])
            .unwrap_or_default()
    }

    fn pop_top(&mut self) -> Notifications {
        let mut notes = Vec::new();
        if let Some(top) = self.readers.pop() {
            notes.push((top, InputReaderAction::Done));
            if let Some(next) = self.readers.last() {
                notes.push((next.clone(), InputReaderAction::Reactivate));
            }
        }
        notes
    }

    /// Pop every finished reader from the top.
    pub(crate) fn pop_finished(&mut self) -> Notifications {
        let mut notes = Vec::new();
        while self.readers.last().is_some_and(InputReader::is_done) {
            notes.extend(self.pop_top());
        }
        // Only the final surviving top needs reactivating.
        let survivor = self.readers.last().cloned();
        notes.retain(|(reader, action)| {
            *action != InputReaderAction::Reactivate
                || survivor.as_ref().is_some_and(|s| s.same_as(reader))
        });
        notes
    }

    /// Buffer bytes for the interpreter and return the complete lines.
    pub(crate) fn take_lines(&mut self, data: &[u8]) -> Vec<String> {
        self.pending_line.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending_line.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending_line.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Take the unterminated line, if any.
    pub(crate) fn take_partial_line(&mut self) -> Option<String> {
        if self.pending_line.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending_line);
        Some(String::from_utf8_lossy(&raw).into_owned())
    }

    pub(crate) fn clear_pending_line(&mut self) {
        self.pending_line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<(InputReaderAction, Vec<u8>)>>>;

    fn recording_reader(granularity: Granularity) -> (InputReader, Log) {
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        let reader = InputReader::builder(move |action, bytes| {
            sink.lock().unwrap().push((action, bytes.to_vec()));
            bytes.len()
        })
        .granularity(granularity)
        .end_token("DONE")
        .build();
        (reader, log)
    }

    fn tokens(log: &Log) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == InputReaderAction::GotToken)
            .map(|(_, b)| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    #[test]
    fn line_granularity_buffers_partial_lines() {
        let (reader, log) = recording_reader(Granularity::Line);
        reader.consume(b"first\r\nsec");
        reader.consume(b"ond\n");
        assert_eq!(tokens(&log), vec!["first", "second"]);
    }

    #[test]
    fn word_granularity() {
        let (reader, log) = recording_reader(Granularity::Word);
        reader.consume(b"one  two\tthree");
        assert_eq!(tokens(&log), vec!["one", "two"]);
    }

    #[test]
    fn end_token_finishes_reader() {
        let (reader, log) = recording_reader(Granularity::Line);
        reader.consume(b"a\nDONE\nb\n");
        assert!(reader.is_done());
        assert_eq!(tokens(&log), vec!["a"]);
    }

    #[test]
    fn push_and_pop_notify_in_order() {
        let (outer, outer_log) = recording_reader(Granularity::Line);
        let (inner, inner_log) = recording_reader(Granularity::Line);
        let mut stack = InputReaderStack::default();

        deliver(stack.push(outer.clone()));
        deliver(stack.push(inner.clone()));
        assert!(stack.is_top(&inner));
        assert!(!outer.is_active());

        deliver(stack.notify_top(InputReaderAction::Done));
        assert!(stack.is_top(&outer));
        assert!(outer.is_active());
        assert!(inner.is_done());

        let outer_actions: Vec<_> = outer_log.lock().unwrap().iter().map(|e| e.0).collect();
        assert_eq!(
            outer_actions,
            vec![
                InputReaderAction::Activate,
                InputReaderAction::Deactivate,
                InputReaderAction::Reactivate
            ]
        );
        let inner_actions: Vec<_> = inner_log.lock().unwrap().iter().map(|e| e.0).collect();
        assert_eq!(
            inner_actions,
            vec![InputReaderAction::Activate, InputReaderAction::Done]
        );
    }

    #[test]
    fn empty_stack_collects_lines() {
        let mut stack = InputReaderStack::default();
        assert!(stack.take_lines(b"help").is_empty());
        assert_eq!(stack.take_lines(b"\nversion\r\n"), vec!["help", "version"]);
        stack.take_lines(b"partial");
        assert_eq!(stack.take_partial_line().as_deref(), Some("partial"));
        assert!(stack.take_partial_line().is_none());
    }
}
