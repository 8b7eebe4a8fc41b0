//! The session controller.
//!
//! [`Debugger`] is a value handle over shared session state: clones alias the
//! same session, and destroying through any clone invalidates all of them.
//! The state lives in a [`DebuggerCore`], registered weakly in the
//! process-wide handle registry so sessions can be found again by id.
//!
//! # Locking
//!
//! Session state sits behind one mutex. Engine calls, reader callbacks, log
//! callbacks and handle closes always happen after that lock is released.

mod builder;
mod handle;
mod interpreter;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;

pub use builder::DebuggerBuilder;
pub use interpreter::CommandInterpreter;

use crate::category::TypeCategoryRegistry;
use crate::engine::Engine;
use crate::event::{Broadcaster, EventBus, EventData, EventMask, Listener};
use crate::input::InputReaderStack;
use crate::io::{self, IoChannelSet};
use crate::log::LogRegistry;
use crate::registry::{self, Teardown};
use crate::target::{Target, TargetId, TargetSet};
use crate::terminal::{self, TerminalState};
use crate::types::{DebuggerId, ScriptLanguage, StateType};
use crate::variables::parse_bool;

/// Mutable session properties.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) prompt: String,
    pub(crate) term_width: u32,
    pub(crate) async_mode: bool,
    pub(crate) use_color: bool,
    pub(crate) use_external_editor: bool,
    pub(crate) close_input_on_eof: bool,
    pub(crate) script_language: ScriptLanguage,
}

impl Settings {
    /// Apply a validated internal variable. Unmapped names are ignored.
    fn apply(&mut self, name: &str, value: &str) {
        match name {
            "prompt" => self.prompt = value.to_string(),
            "term-width" => {
                if let Ok(width) = value.parse() {
                    self.term_width = width;
                }
            }
            "use-color" => self.use_color = parse_bool(value).unwrap_or(self.use_color),
            "use-external-editor" => {
                self.use_external_editor = parse_bool(value).unwrap_or(self.use_external_editor);
            }
            "close-input-on-eof" => {
                self.close_input_on_eof = parse_bool(value).unwrap_or(self.close_input_on_eof);
            }
            "script-lang" => self.script_language = ScriptLanguage::from_name(value),
            _ => {}
        }
    }
}

/// Everything that goes away when a session is destroyed.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) settings: Settings,
    pub(crate) targets: TargetSet,
    pub(crate) io: IoChannelSet,
    pub(crate) readers: InputReaderStack,
    pub(crate) categories: TypeCategoryRegistry,
    pub(crate) platform: String,
    pub(crate) saved_terminal: Option<TerminalState>,
    pub(crate) history: Vec<String>,
}

/// Shared state behind every clone of a [`Debugger`].
pub(crate) struct DebuggerCore {
    pub(crate) id: DebuggerId,
    pub(crate) instance_name: String,
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) listener: Listener,
    pub(crate) logs: LogRegistry,
    pub(crate) sync_timeout: Option<Duration>,
    state: Mutex<Option<SessionState>>,
}

impl DebuggerCore {
    fn lock(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the live state. `None` once destroyed.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn log(&self, channel: &str, category: &str, message: fmt::Arguments<'_>) {
        self.logs.emit(channel, category, message);
    }

    /// Broadcast an event and report it on the `events` channel.
    pub(crate) fn post(&self, broadcaster: &Broadcaster, kind: EventMask, data: EventData) {
        let event = broadcaster.broadcast(kind, data);
        self.log(
            "events",
            "default",
            format_args!(
                "{} posted {kind:?} (#{})",
                broadcaster.name(),
                event.sequence()
            ),
        );
    }

    pub(crate) fn target_by_id(&self, id: TargetId) -> Option<Target> {
        self.with_state(|s| s.targets.find_by_id(id)).flatten()
    }

    /// Tear the session down. Safe to call more than once.
    pub(crate) fn shutdown(&self) {
        let Some(mut state) = self.lock().take() else {
            return;
        };
        let state_registry = registry::process();
        state_registry.debuggers.unregister(self.id.as_u64());
        state_registry.variables.remove_instance(&self.instance_name);

        let targets = state.targets.clear();
        for target in &targets {
            self.engine.target_deleted(target);
        }
        io::close_all(state.io.take_all_owned());
        if let Some(saved) = state.saved_terminal.take() {
            if let Err(e) = terminal::restore(saved) {
                tracing::warn!(error = %e, "failed to restore terminal state");
            }
        }
        self.engine.shutdown();
        tracing::info!(
            debugger = self.id.as_u64(),
            targets = targets.len(),
            "debugger destroyed"
        );
    }
}

impl Teardown for DebuggerCore {
    fn teardown(&self) {
        self.shutdown();
    }
}

impl Drop for DebuggerCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for DebuggerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebuggerCore")
            .field("id", &self.id)
            .field("instance_name", &self.instance_name)
            .field("engine", &self.engine.name())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Posts engine events into a session.
///
/// Holds the session weakly; posting to a destroyed session is a no-op that
/// returns false.
#[derive(Debug, Clone)]
pub struct EventSink {
    core: Weak<DebuggerCore>,
}

impl EventSink {
    pub(crate) fn new(core: &Arc<DebuggerCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    fn live(&self) -> Option<Arc<DebuggerCore>> {
        self.core.upgrade().filter(|core| core.is_live())
    }

    /// Check if the session is still alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live().is_some()
    }

    /// Report a process state change.
    ///
    /// The target's process record is updated before listeners see the event.
    pub fn post_process_state(
        &self,
        target: TargetId,
        pid: Option<u32>,
        state: StateType,
        exit_status: Option<i32>,
    ) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        let Some(target) = core.target_by_id(target) else {
            return false;
        };
        let data = EventData::ProcessState {
            pid,
            state,
            exit_status,
        };
        target.apply_process_event(&data);
        core.log(
            "process",
            "state",
            format_args!("process {pid:?} of target {} is {state}", target.id()),
        );
        core.post(
            target.process().broadcaster(),
            EventMask::PROCESS_STATE_CHANGED,
            data,
        );
        true
    }

    /// Report bytes a process wrote. `kind` is `PROCESS_STDOUT` or
    /// `PROCESS_STDERR`.
    pub fn post_process_output(&self, target: TargetId, kind: EventMask, data: Bytes) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        let Some(target) = core.target_by_id(target) else {
            return false;
        };
        core.post(target.process().broadcaster(), kind, EventData::Output(data));
        true
    }

    /// Report a target-level event such as a breakpoint hit.
    pub fn post_target_event(&self, target: TargetId, kind: EventMask, data: EventData) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        let Some(target) = core.target_by_id(target) else {
            return false;
        };
        core.post(target.broadcaster(), kind, data);
        true
    }

    /// Report a session-level event such as a warning.
    pub fn post_session_event(&self, kind: EventMask, data: EventData) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        core.post(&core.broadcaster, kind, data);
        true
    }

    /// The last reported state of a target's process.
    #[must_use]
    pub fn process_state(&self, target: TargetId) -> Option<StateType> {
        self.live()
            .and_then(|core| core.target_by_id(target))
            .map(|t| t.process().state())
    }
}

/// A debugger session.
///
/// Clones share one session. An empty handle (from [`Debugger::default`],
/// [`Debugger::clear`] or a failed lookup) is invalid, as is every clone of a
/// destroyed session; operations on an invalid handle return `None`, `false`
/// or defaults.
#[derive(Clone, Default)]
pub struct Debugger {
    core: Option<Arc<DebuggerCore>>,
}

impl Debugger {
    pub(crate) fn from_core(core: Arc<DebuggerCore>) -> Self {
        Self { core: Some(core) }
    }

    /// The core, if the session is alive.
    pub(crate) fn live(&self) -> Option<&Arc<DebuggerCore>> {
        self.core.as_ref().filter(|core| core.is_live())
    }
}

impl PartialEq for Debugger {
    fn eq(&self, other: &Self) -> bool {
        match (&self.core, &other.core) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.live() {
            Some(core) => write!(
                f,
                "Debugger (instance: \"{}\", id: {})",
                core.instance_name, core.id
            ),
            None => f.write_str("No value"),
        }
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger").field("core", &self.core).finish()
    }
}
