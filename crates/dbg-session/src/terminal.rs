//! Host terminal state.
//!
//! Input readers and engines may switch the controlling terminal into raw
//! mode. A session snapshots the mode before handing the terminal over and
//! puts it back afterwards.

use std::io;

use crossterm::terminal;
use crossterm::tty::IsTty;

/// A snapshot of the host terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalState {
    /// Raw mode was enabled.
    pub raw_mode: bool,
}

/// Check if the process standard input is a terminal.
#[must_use]
pub fn stdin_is_tty() -> bool {
    io::stdin().is_tty()
}

/// Capture the current terminal state. `None` when stdin is not a terminal.
#[must_use]
pub fn capture() -> Option<TerminalState> {
    if !stdin_is_tty() {
        return None;
    }
    match terminal::is_raw_mode_enabled() {
        Ok(raw_mode) => Some(TerminalState { raw_mode }),
        Err(e) => {
            tracing::debug!(error = %e, "unable to query terminal mode");
            None
        }
    }
}

/// Put the terminal back into a captured state.
pub fn restore(state: TerminalState) -> io::Result<()> {
    let current = terminal::is_raw_mode_enabled()?;
    match (current, state.raw_mode) {
        (true, false) => terminal::disable_raw_mode(),
        (false, true) => terminal::enable_raw_mode(),
        _ => Ok(()),
    }
}

/// Width of the host terminal in columns, if stdout is a terminal.
#[must_use]
pub fn width() -> Option<u32> {
    if !io::stdout().is_tty() {
        return None;
    }
    terminal::size().ok().map(|(cols, _)| u32::from(cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_matching_state_is_noop() {
        // Only meaningful on a terminal; elsewhere capture declines.
        if let Some(state) = capture() {
            restore(state).unwrap();
            assert_eq!(capture(), Some(state));
        }
    }
}
