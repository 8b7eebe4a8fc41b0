//! Command submission.

use std::sync::{Arc, Weak};
use std::time::Instant;

use super::{Debugger, DebuggerCore};
use crate::engine::{CommandRequest, CommandReturn, ReturnStatus};
use crate::event::{EventData, EventMask, Listener};
use crate::io::{Channel, FileHandle};
use crate::target::TargetId;

/// Maximum number of lines kept in the command history.
const HISTORY_LIMIT: usize = 500;

impl DebuggerCore {
    /// Run one command line through the engine.
    ///
    /// Output goes to the session's output and error handles. In synchronous
    /// mode a command that resumed a target blocks until that target's
    /// process stops or exits, or until the sync timeout elapses.
    pub(crate) fn execute(&self, line: &str) -> CommandReturn {
        let Some((selected, async_mode, out, err)) = self.with_state(|s| {
            (
                s.targets.selected().map(|t| t.id()),
                s.settings.async_mode,
                s.io.get(Channel::Output),
                s.io.get(Channel::Error),
            )
        }) else {
            return CommandReturn::failure("error: invalid debugger\n");
        };

        // Registered before dispatch so a stop posted while the engine is
        // still returning is not missed.
        let hijack = (!async_mode).then(|| {
            let listener = Listener::new(format!("dbg.debugger.{}.hijack", self.id));
            listener.listen_to_all(&self.broadcaster, EventMask::PROCESS_STATE_CHANGED);
            listener
        });

        let request = CommandRequest {
            line: line.to_string(),
            selected_target: selected,
            async_mode,
        };
        let result = self.engine.handle_command(&request);
        write_text(&out, &result.output);
        write_text(&err, &result.error);

        if let (Some(listener), ReturnStatus::Resumed, Some(target)) =
            (&hijack, result.status, result.resumed_target)
        {
            self.wait_for_stop(listener, target);
        }

        self.with_state(|s| {
            s.history.push(line.to_string());
            if s.history.len() > HISTORY_LIMIT {
                let excess = s.history.len() - HISTORY_LIMIT;
                s.history.drain(..excess);
            }
        });
        self.log(
            "commands",
            "default",
            format_args!("'{line}' finished: {:?}", result.status),
        );
        self.post(
            &self.broadcaster,
            EventMask::COMMAND_FINISHED,
            EventData::Command {
                line: line.to_string(),
                status: result.status,
            },
        );
        result
    }

    fn wait_for_stop(&self, listener: &Listener, target: TargetId) {
        let Some(target) = self.target_by_id(target) else {
            return;
        };
        let deadline = self.sync_timeout.map(|t| Instant::now() + t);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let Some(event) = listener.wait(remaining) else {
                tracing::warn!(
                    target = target.id().as_u64(),
                    timeout = ?self.sync_timeout,
                    "gave up waiting for the target to stop"
                );
                return;
            };
            if !target.owns_broadcaster(event.source()) {
                continue;
            }
            if event.process_state().is_some_and(|s| s.is_stopped()) {
                self.log(
                    "commands",
                    "verbose",
                    format_args!("target {} stopped", target.id()),
                );
                return;
            }
        }
    }
}

fn write_text(handle: &FileHandle, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Err(e) = handle.write_all(text.as_bytes()) {
        tracing::warn!(error = %e, "failed to write command output");
    }
}

impl Debugger {
    /// Run one command line.
    ///
    /// Returns [`ReturnStatus::Failed`] for an invalid handle.
    pub fn handle_command(&self, line: &str) -> ReturnStatus {
        let Some(core) = self.live() else {
            return ReturnStatus::Failed;
        };
        core.log("api", "default", format_args!("handle_command({line:?})"));
        core.execute(line).status
    }

    /// The session's command interpreter.
    #[must_use]
    pub fn command_interpreter(&self) -> CommandInterpreter {
        CommandInterpreter {
            core: self.live().map(Arc::downgrade).unwrap_or_default(),
        }
    }
}

/// A non-owning handle to a session's command interpreter.
///
/// It does not keep the session alive and becomes invalid once the session
/// is destroyed.
#[derive(Debug, Clone, Default)]
pub struct CommandInterpreter {
    core: Weak<DebuggerCore>,
}

impl CommandInterpreter {
    fn live(&self) -> Option<Arc<DebuggerCore>> {
        self.core.upgrade().filter(|core| core.is_live())
    }

    /// Check if the session is alive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Run a command and return its full result.
    pub fn handle_command(&self, line: &str) -> CommandReturn {
        match self.live() {
            Some(core) => core.execute(line),
            None => CommandReturn::failure("error: invalid debugger\n"),
        }
    }

    /// Lines run so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.live()
            .and_then(|core| core.with_state(|s| s.history.clone()))
            .unwrap_or_default()
    }

    /// Forget the command history.
    pub fn clear_history(&self) {
        if let Some(core) = self.live() {
            core.with_state(|s| s.history.clear());
        }
    }

    /// The owning session.
    #[must_use]
    pub fn debugger(&self) -> Option<Debugger> {
        self.live().map(Debugger::from_core)
    }
}
