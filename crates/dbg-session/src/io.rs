//! Console I/O endpoints.
//!
//! A session has three channels (input, output, error). Each channel holds a
//! [`FileHandle`] and a flag saying whether the session owns it. Owned handles
//! are closed by the session when replaced or on teardown; handles that are
//! not owned are never closed by the session. Unset channels fall back to the
//! process standard streams.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crossterm::tty::IsTty;

/// A duplex byte stream that can back a [`FileHandle`].
pub trait Stream: Read + Write + Send {
    /// Release the underlying resource.
    ///
    /// The default flushes pending output.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    /// Check if the stream is attached to a terminal.
    fn is_terminal(&self) -> bool {
        false
    }
}

impl Stream for File {
    fn is_terminal(&self) -> bool {
        self.is_tty()
    }
}

impl Stream for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl Stream for Cursor<Vec<u8>> {}

/// One of the process standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    /// Standard input.
    Stdin,
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl Read for StdStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdin => io::stdin().read(buf),
            Self::Stdout | Self::Stderr => Ok(0),
        }
    }
}

impl Write for StdStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdin => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not writable",
            )),
            Self::Stdout => io::stdout().write(buf),
            Self::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdin => Ok(()),
            Self::Stdout => io::stdout().flush(),
            Self::Stderr => io::stderr().flush(),
        }
    }
}

impl Stream for StdStream {
    fn is_terminal(&self) -> bool {
        match self {
            Self::Stdin => io::stdin().is_tty(),
            Self::Stdout => io::stdout().is_tty(),
            Self::Stderr => io::stderr().is_tty(),
        }
    }
}

#[derive(Debug, Default)]
struct SharedBuffer {
    input: VecDeque<u8>,
    output: Vec<u8>,
    closed: bool,
    close_count: usize,
}

/// In-memory stream for tests and embedding.
///
/// Clones share the same buffers, so a caller can keep one clone to inspect
/// what the session wrote and how often it was closed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    shared: Arc<Mutex<SharedBuffer>>,
}

impl MemoryStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream with bytes queued for reading.
    #[must_use]
    pub fn with_input(data: &[u8]) -> Self {
        let stream = Self::new();
        stream.push_input(data);
        stream
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, SharedBuffer> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for reading.
    pub fn push_input(&self, data: &[u8]) {
        self.buffer().input.extend(data);
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer().output).into_owned()
    }

    /// Drain everything written so far.
    #[must_use]
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.buffer().output)
    }

    /// How many times the stream was closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.buffer().close_count
    }

    /// Check if the stream was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.buffer().closed
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.buffer();
        let n = buf.len().min(shared.input.len());
        for (slot, byte) in buf.iter_mut().zip(shared.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.buffer();
        if shared.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
        }
        shared.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Stream for MemoryStream {
    fn close(&mut self) -> io::Result<()> {
        let mut shared = self.buffer();
        shared.closed = true;
        shared.close_count += 1;
        Ok(())
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

static STDIN: LazyLock<FileHandle> = LazyLock::new(|| FileHandle::standard(StdStream::Stdin));
static STDOUT: LazyLock<FileHandle> = LazyLock::new(|| FileHandle::standard(StdStream::Stdout));
static STDERR: LazyLock<FileHandle> = LazyLock::new(|| FileHandle::standard(StdStream::Stderr));

/// A shareable handle to a byte stream.
///
/// Clones refer to the same stream; [`FileHandle::same_as`] compares identity.
#[derive(Clone)]
pub struct FileHandle {
    id: u64,
    std: Option<StdStream>,
    stream: Arc<Mutex<Box<dyn Stream>>>,
}

impl FileHandle {
    /// Wrap a stream.
    pub fn new(stream: impl Stream + 'static) -> Self {
        Self::from_boxed(Box::new(stream), None)
    }

    fn standard(stream: StdStream) -> Self {
        Self::from_boxed(Box::new(stream), Some(stream))
    }

    fn from_boxed(stream: Box<dyn Stream>, std: Option<StdStream>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            std,
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Handle to the process standard input.
    #[must_use]
    pub fn stdin() -> Self {
        STDIN.clone()
    }

    /// Handle to the process standard output.
    #[must_use]
    pub fn stdout() -> Self {
        STDOUT.clone()
    }

    /// Handle to the process standard error.
    #[must_use]
    pub fn stderr() -> Self {
        STDERR.clone()
    }

    /// Unique id of the underlying stream.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Check if both handles refer to the same stream.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.stream, &other.stream)
    }

    /// The standard stream this handle wraps, if any.
    #[must_use]
    pub const fn std_stream(&self) -> Option<StdStream> {
        self.std
    }

    fn with_stream<R>(&self, f: impl FnOnce(&mut dyn Stream) -> R) -> R {
        let mut guard = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut())
    }

    /// Write all bytes and flush.
    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.with_stream(|s| {
            s.write_all(data)?;
            s.flush()
        })
    }

    /// Read into a buffer.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_stream(|s| s.read(buf))
    }

    /// Close the stream.
    pub fn close(&self) -> io::Result<()> {
        tracing::debug!(handle = self.id, "closing file handle");
        self.with_stream(|s| s.close())
    }

    /// Check if the stream is a terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.with_stream(|s| s.is_terminal())
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("std", &self.std)
            .finish()
    }
}

impl From<StdStream> for FileHandle {
    fn from(stream: StdStream) -> Self {
        match stream {
            StdStream::Stdin => Self::stdin(),
            StdStream::Stdout => Self::stdout(),
            StdStream::Stderr => Self::stderr(),
        }
    }
}

/// A console channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Input consumed by the command interpreter.
    Input,
    /// Normal output.
    Output,
    /// Error output.
    Error,
}

impl Channel {
    const fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Error => 2,
        }
    }

    pub(crate) fn default_handle(self) -> FileHandle {
        match self {
            Self::Input => FileHandle::stdin(),
            Self::Output => FileHandle::stdout(),
            Self::Error => FileHandle::stderr(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    handle: FileHandle,
    owned: bool,
}

/// The session's three channels.
///
/// Mutators return the handles the caller must close, so closing can happen
/// outside any lock guarding the set.
#[derive(Debug, Default)]
pub(crate) struct IoChannelSet {
    slots: [Option<Slot>; 3],
}

impl IoChannelSet {
    /// Install a handle. Returns the previous handle if it was owned and no
    /// channel still uses it.
    #[must_use]
    pub(crate) fn set(
        &mut self,
        channel: Channel,
        handle: FileHandle,
        owned: bool,
    ) -> Option<FileHandle> {
        let previous = self.slots[channel.index()].replace(Slot { handle, owned });
        previous.and_then(|prev| self.release(prev))
    }

    /// Settle a slot that left the set. An owned handle still installed on
    /// another channel stays open and that channel takes over ownership.
    fn release(&mut self, slot: Slot) -> Option<FileHandle> {
        if !slot.owned {
            return None;
        }
        let mut still_used = false;
        for other in self.slots.iter_mut().flatten() {
            if other.handle.same_as(&slot.handle) {
                other.owned = true;
                still_used = true;
            }
        }
        (!still_used).then_some(slot.handle)
    }

    /// The installed handle, or the standard stream when unset.
    pub(crate) fn get(&self, channel: Channel) -> FileHandle {
        self.slots[channel.index()]
            .as_ref()
            .map_or_else(|| channel.default_handle(), |slot| slot.handle.clone())
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self, channel: Channel) -> bool {
        self.slots[channel.index()].is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_owned(&self, channel: Channel) -> bool {
        self.slots[channel.index()]
            .as_ref()
            .is_some_and(|slot| slot.owned)
    }

    /// Remove an owned handle from one channel. Returns it if no other
    /// channel still uses it.
    #[must_use]
    pub(crate) fn take_owned(&mut self, channel: Channel) -> Option<FileHandle> {
        let slot = &mut self.slots[channel.index()];
        if !slot.as_ref().is_some_and(|s| s.owned) {
            return None;
        }
        let taken = slot.take()?;
        self.release(taken)
    }

    /// Empty every channel, returning the owned handles.
    ///
    /// A stream installed on several channels is returned once.
    #[must_use]
    pub(crate) fn take_all_owned(&mut self) -> Vec<FileHandle> {
        let mut owned: Vec<FileHandle> = Vec::new();
        for slot in &mut self.slots {
            if let Some(Slot { handle, owned: true }) = slot.take() {
                if !owned.iter().any(|h| h.same_as(&handle)) {
                    owned.push(handle);
                }
            }
        }
        owned
    }
}

/// Close handles, logging failures.
pub(crate) fn close_all(handles: impl IntoIterator<Item = FileHandle>) {
    for handle in handles {
        if let Err(e) = handle.close() {
            tracing::warn!(handle = handle.id(), error = %e, "failed to close file handle");
        }
    }
}
