//! The mock engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use super::module::MockModule;
use crate::engine::host::KNOWN_PLATFORMS;
use crate::engine::{
    CommandRequest, CommandReturn, Engine, EngineError, EventSink, HostEngine, ModuleInfo,
    ModuleRequest,
};
use crate::event::EventMask;
use crate::target::{Target, TargetId};
use crate::types::StateType;

/// Default delay before a resumed mock process stops again.
const DEFAULT_STOP_DELAY: Duration = Duration::from_millis(20);

/// First pid handed out.
const FIRST_PID: u32 = 1000;

#[derive(Debug)]
struct MockState {
    modules: HashMap<PathBuf, MockModule>,
    responses: HashMap<String, CommandReturn>,
    requests: Vec<CommandRequest>,
    created: Vec<TargetId>,
    deleted: Vec<TargetId>,
    pids: HashMap<TargetId, u32>,
    sink: Option<EventSink>,
    stop_delay: Option<Duration>,
    next_pid: u32,
    platform: String,
    sdk_root: Option<PathBuf>,
    cache_entries: usize,
    attach_count: usize,
    shutdown_count: usize,
}

/// A scripted engine.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// session owns another.
///
/// Built-in commands:
///
/// | Command | Effect |
/// |---------|--------|
/// | `run`, `r`, `process launch` | posts `Running`, returns resumed, posts `Stopped` later |
/// | `continue`, `c`, `process continue` | same, for a stopped process |
/// | `process interrupt` | posts `Stopped` |
/// | `kill`, `process kill` | posts `Exited` with status 9 |
///
/// Anything else is answered by a scripted response or, failing that, by the
/// host engine's `help`/`version`/`quit`.
#[derive(Debug, Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    fallback: Arc<HostEngine>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// An engine with no modules and no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                modules: HashMap::new(),
                responses: HashMap::new(),
                requests: Vec::new(),
                created: Vec::new(),
                deleted: Vec::new(),
                pids: HashMap::new(),
                sink: None,
                stop_delay: Some(DEFAULT_STOP_DELAY),
                next_pid: FIRST_PID,
                platform: "host".to_string(),
                sdk_root: None,
                cache_entries: 0,
                attach_count: 0,
                shutdown_count: 0,
            })),
            fallback: Arc::new(HostEngine::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a module path.
    #[must_use]
    pub fn with_module(self, path: impl Into<PathBuf>, module: MockModule) -> Self {
        self.lock().modules.insert(path.into(), module);
        self
    }

    /// Script the reply to an exact command line.
    #[must_use]
    pub fn with_response(self, line: impl Into<String>, reply: CommandReturn) -> Self {
        self.lock().responses.insert(line.into(), reply);
        self
    }

    /// Delay before a resumed process stops. `None` keeps it running.
    #[must_use]
    pub fn with_stop_delay(self, delay: Option<Duration>) -> Self {
        self.lock().stop_delay = delay;
        self
    }

    /// Pretend to hold `entries` cache entries until memory pressure.
    #[must_use]
    pub fn with_cache_entries(self, entries: usize) -> Self {
        self.lock().cache_entries = entries;
        self
    }

    /// Command lines received, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.line.clone()).collect()
    }

    /// Full command requests received.
    #[must_use]
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.lock().requests.clone()
    }

    /// Targets reported as created.
    #[must_use]
    pub fn created_targets(&self) -> Vec<TargetId> {
        self.lock().created.clone()
    }

    /// Targets reported as deleted.
    #[must_use]
    pub fn deleted_targets(&self) -> Vec<TargetId> {
        self.lock().deleted.clone()
    }

    /// The sink, while a session is attached.
    #[must_use]
    pub fn sink(&self) -> Option<EventSink> {
        self.lock().sink.clone()
    }

    /// Number of `attach` calls.
    #[must_use]
    pub fn attach_count(&self) -> usize {
        self.lock().attach_count
    }

    /// Number of `shutdown` calls.
    #[must_use]
    pub fn shutdown_count(&self) -> usize {
        self.lock().shutdown_count
    }

    /// The selected platform.
    #[must_use]
    pub fn platform(&self) -> String {
        self.lock().platform.clone()
    }

    /// The SDK root, if set.
    #[must_use]
    pub fn sdk_root(&self) -> Option<PathBuf> {
        self.lock().sdk_root.clone()
    }

    /// Post process output for a target.
    pub fn emit_output(&self, target: TargetId, stderr: bool, text: &str) -> bool {
        let kind = if stderr {
            EventMask::PROCESS_STDERR
        } else {
            EventMask::PROCESS_STDOUT
        };
        self.sink().is_some_and(|sink| {
            sink.post_process_output(target, kind, Bytes::copy_from_slice(text.as_bytes()))
        })
    }

    /// Post a process state change for a target.
    pub fn emit_state(&self, target: TargetId, state: StateType, exit_status: Option<i32>) -> bool {
        let (sink, pid) = {
            let guard = self.lock();
            (guard.sink.clone(), guard.pids.get(&target).copied())
        };
        sink.is_some_and(|sink| sink.post_process_state(target, pid, state, exit_status))
    }

    fn resume(&self, target: TargetId, pid: u32, output: String) -> CommandReturn {
        let (sink, delay) = {
            let guard = self.lock();
            (guard.sink.clone(), guard.stop_delay)
        };
        let Some(sink) = sink else {
            return CommandReturn::failure("error: engine is not attached\n");
        };
        sink.post_process_state(target, Some(pid), StateType::Running, None);
        if let Some(delay) = delay {
            let stopper = sink.clone();
            thread::spawn(move || {
                thread::sleep(delay);
                stopper.post_process_state(target, Some(pid), StateType::Stopped, None);
            });
        }
        CommandReturn::resumed(target, output)
    }

    fn launch(&self, target: TargetId) -> CommandReturn {
        let pid = {
            let mut guard = self.lock();
            let pid = guard.next_pid;
            guard.next_pid += 1;
            guard.pids.insert(target, pid);
            pid
        };
        self.resume(target, pid, format!("Process {pid} launched\n"))
    }

    fn stopped_pid(&self, target: TargetId) -> Result<u32, CommandReturn> {
        let (sink, pid) = {
            let guard = self.lock();
            (guard.sink.clone(), guard.pids.get(&target).copied())
        };
        let state = sink.and_then(|s| s.process_state(target));
        match (pid, state) {
            (Some(pid), Some(state)) if state.is_alive() => Ok(pid),
            _ => Err(CommandReturn::failure("error: Process must be launched.\n")),
        }
    }
}

fn no_target() -> CommandReturn {
    CommandReturn::failure(
        "error: invalid target, create a target using the 'target create' command\n",
    )
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn attach(&self, sink: EventSink) {
        let mut guard = self.lock();
        guard.sink = Some(sink);
        guard.attach_count += 1;
    }

    fn load_module(&self, request: &ModuleRequest) -> Result<ModuleInfo, EngineError> {
        let module = self.lock().modules.get(&request.path).cloned();
        let Some(module) = module else {
            return Err(EngineError::Unloadable {
                path: request.path.clone(),
                reason: "no such file".to_string(),
            });
        };
        module.load(&request.path, request)
    }

    fn target_created(&self, target: &Target) {
        self.lock().created.push(target.id());
    }

    fn target_deleted(&self, target: &Target) {
        let mut guard = self.lock();
        guard.deleted.push(target.id());
        guard.pids.remove(&target.id());
    }

    fn handle_command(&self, request: &CommandRequest) -> CommandReturn {
        let scripted = {
            let mut guard = self.lock();
            guard.requests.push(request.clone());
            guard.responses.get(request.line.trim()).cloned()
        };
        if let Some(reply) = scripted {
            return reply;
        }

        let words: Vec<&str> = request.line.split_whitespace().collect();
        let builtin = matches!(
            words.as_slice(),
            ["run" | "r"] | ["process", "launch" | "continue" | "interrupt" | "kill"]
                | ["continue" | "c"] | ["kill"]
        );
        if !builtin {
            return self.fallback.handle_command(request);
        }
        let Some(target) = request.selected_target else {
            return no_target();
        };

        match words.as_slice() {
            ["run" | "r"] | ["process", "launch"] => self.launch(target),
            ["continue" | "c"] | ["process", "continue"] => match self.stopped_pid(target) {
                Ok(pid) => self.resume(target, pid, format!("Process {pid} resuming\n")),
                Err(reply) => reply,
            },
            ["process", "interrupt"] => match self.stopped_pid(target) {
                Ok(_) => {
                    self.emit_state(target, StateType::Stopped, None);
                    CommandReturn::success("")
                }
                Err(reply) => reply,
            },
            _ => match self.stopped_pid(target) {
                Ok(pid) => {
                    self.emit_state(target, StateType::Exited, Some(9));
                    CommandReturn::success(format!("Process {pid} killed\n"))
                }
                Err(reply) => reply,
            },
        }
    }

    fn select_platform(&self, name: &str) -> Result<(), EngineError> {
        if !KNOWN_PLATFORMS.contains(&name) {
            return Err(EngineError::UnknownPlatform(name.to_string()));
        }
        let mut guard = self.lock();
        if guard.platform != name {
            guard.platform = name.to_string();
            guard.sdk_root = None;
        }
        Ok(())
    }

    fn set_platform_sdk_root(&self, path: &Path) -> Result<(), EngineError> {
        if !path.is_dir() {
            return Err(EngineError::BadSdkRoot(path.to_path_buf()));
        }
        self.lock().sdk_root = Some(path.to_path_buf());
        Ok(())
    }

    fn release_caches(&self) -> usize {
        std::mem::take(&mut self.lock().cache_entries)
    }

    fn shutdown(&self) {
        let mut guard = self.lock();
        guard.sink = None;
        guard.shutdown_count += 1;
    }
}
