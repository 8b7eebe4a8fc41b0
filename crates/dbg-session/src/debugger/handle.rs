//! The public operations of a session handle.

use std::path::Path;
use std::sync::Arc;

use super::{Debugger, DebuggerBuilder, DebuggerCore, SessionState};
use crate::category::TypeCategory;
use crate::engine::{ModuleInfo, ModuleRequest, host};
use crate::error::{DebugError, Result};
use crate::event::{Broadcaster, Event, EventData, EventMask, Listener};
use crate::formatters::{TypeFilter, TypeFormat, TypeNameSpecifier, TypeSummary, TypeSynthetic};
use crate::input::{self, InputReader, InputReaderAction};
use crate::io::{self, Channel, FileHandle, StdStream};
use crate::log::LogCallback;
use crate::registry;
use crate::target::{Process, Target};
use crate::terminal;
use crate::types::{DebuggerId, ScriptLanguage, StateType};

impl Debugger {
    /// Create a session with the built-in engine.
    ///
    /// Init files are read only when `source_init_files` is set.
    pub fn create(source_init_files: bool, log_callback: Option<LogCallback>) -> Self {
        let mut builder = Self::builder().source_init_files(source_init_files);
        if let Some(callback) = log_callback {
            builder = builder.log_callback(callback);
        }
        builder.build()
    }

    /// Start building a session.
    #[must_use]
    pub fn builder() -> DebuggerBuilder {
        DebuggerBuilder::new()
    }

    /// Force creation of process-wide state.
    pub fn initialize() {
        registry::initialize();
    }

    /// Destroy every live session, then clear process-wide variables and the
    /// default architecture.
    pub fn terminate() {
        registry::terminate();
    }

    /// Look up a live session by id.
    #[must_use]
    pub fn find_debugger_with_id(id: DebuggerId) -> Option<Self> {
        registry::process()
            .debuggers
            .get(id.as_u64())
            .filter(|core| core.is_live())
            .map(Self::from_core)
    }

    /// Ask every session's engine to drop caches it can rebuild.
    ///
    /// Returns the number of entries released.
    pub fn memory_pressure_detected() -> usize {
        let mut released = crate::formatters::cache::release_matchers();
        for core in registry::process().debuggers.live() {
            released += core.engine.release_caches();
        }
        tracing::info!(released, "released caches after memory pressure");
        released
    }

    /// Set an internal variable for a session instance.
    ///
    /// A live session with that instance name picks the value up at once.
    pub fn set_internal_variable(name: &str, value: &str, instance: &str) -> Result<()> {
        let state = registry::process();
        let normalized = state.variables.set(name, value, instance)?;
        if let Some(core) = state.debuggers.find(|core| core.instance_name == instance) {
            core.with_state(|s| s.settings.apply(name, &normalized));
        }
        tracing::debug!(name, value = %normalized, instance, "internal variable set");
        Ok(())
    }

    /// The values of an internal variable. Empty if never set.
    #[must_use]
    pub fn internal_variable_value(name: &str, instance: &str) -> Vec<String> {
        registry::process().variables.get(name, instance)
    }

    /// Architecture used when a target is created without a triple.
    #[must_use]
    pub fn default_architecture() -> Option<String> {
        registry::process().default_arch()
    }

    /// Set the default architecture. An empty name clears it.
    ///
    /// Returns false for an unrecognized architecture.
    pub fn set_default_architecture(name: &str) -> bool {
        if name.is_empty() {
            registry::process().set_default_arch(None);
            return true;
        }
        if !host::is_known_arch(name) {
            tracing::debug!(arch = name, "rejected default architecture");
            return false;
        }
        registry::process().set_default_arch(Some(name.to_string()));
        true
    }

    /// Destroy the session. Every clone becomes invalid.
    pub fn destroy(&mut self) {
        if let Some(core) = self.core.take() {
            core.log("api", "default", format_args!("destroy({})", core.id));
            core.shutdown();
        }
    }

    /// Drop this handle's reference without destroying the session.
    pub fn clear(&mut self) {
        self.core = None;
    }

    /// Check if the handle refers to a live session.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Session id. `None` for an invalid handle.
    #[must_use]
    pub fn id(&self) -> Option<DebuggerId> {
        self.live().map(|core| core.id)
    }

    /// Name under which internal variables are stored.
    #[must_use]
    pub fn instance_name(&self) -> Option<String> {
        self.live().map(|core| core.instance_name.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        self.live().and_then(|core| core.with_state(f))
    }

    fn store_variable(&self, name: &str, value: &str) {
        if let Some(core) = self.live() {
            if let Err(e) = registry::process()
                .variables
                .set(name, value, &core.instance_name)
            {
                tracing::debug!(error = %e, name, "property not mirrored");
            }
        }
    }

    // Properties.

    /// Switch between synchronous and asynchronous command execution.
    pub fn set_async(&self, async_mode: bool) {
        self.with_state(|s| s.settings.async_mode = async_mode);
    }

    /// Check if commands return without waiting for the target to stop.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.with_state(|s| s.settings.async_mode).unwrap_or(false)
    }

    /// The command prompt. Empty for an invalid handle.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.with_state(|s| s.settings.prompt.clone())
            .unwrap_or_default()
    }

    /// Set the command prompt.
    pub fn set_prompt(&self, prompt: &str) {
        if self.with_state(|s| s.settings.prompt = prompt.to_string()).is_some() {
            self.store_variable("prompt", prompt);
        }
    }

    /// Terminal width in columns.
    #[must_use]
    pub fn terminal_width(&self) -> u32 {
        self.with_state(|s| s.settings.term_width).unwrap_or(0)
    }

    /// Set the terminal width.
    pub fn set_terminal_width(&self, width: u32) {
        if self.with_state(|s| s.settings.term_width = width).is_some() {
            self.store_variable("term-width", &width.to_string());
        }
    }

    /// Check if output may use color.
    #[must_use]
    pub fn use_color(&self) -> bool {
        self.with_state(|s| s.settings.use_color).unwrap_or(false)
    }

    /// Enable or disable color. False for an invalid handle.
    pub fn set_use_color(&self, use_color: bool) -> bool {
        let applied = self.with_state(|s| s.settings.use_color = use_color).is_some();
        if applied {
            self.store_variable("use-color", &use_color.to_string());
        }
        applied
    }

    /// Check if source is opened in an external editor.
    #[must_use]
    pub fn use_external_editor(&self) -> bool {
        self.with_state(|s| s.settings.use_external_editor)
            .unwrap_or(false)
    }

    /// Enable or disable the external editor. False for an invalid handle.
    pub fn set_use_external_editor(&self, enabled: bool) -> bool {
        let applied = self
            .with_state(|s| s.settings.use_external_editor = enabled)
            .is_some();
        if applied {
            self.store_variable("use-external-editor", &enabled.to_string());
        }
        applied
    }

    /// Check if an owned input handle is closed at end of file.
    #[must_use]
    pub fn close_input_on_eof(&self) -> bool {
        self.with_state(|s| s.settings.close_input_on_eof)
            .unwrap_or(false)
    }

    /// Set whether an owned input handle is closed at end of file.
    pub fn set_close_input_on_eof(&self, close: bool) {
        if self
            .with_state(|s| s.settings.close_input_on_eof = close)
            .is_some()
        {
            self.store_variable("close-input-on-eof", &close.to_string());
        }
    }

    /// The scripting language.
    #[must_use]
    pub fn script_language(&self) -> ScriptLanguage {
        self.with_state(|s| s.settings.script_language)
            .unwrap_or(ScriptLanguage::None)
    }

    /// Set the scripting language.
    pub fn set_script_language(&self, language: ScriptLanguage) {
        if self
            .with_state(|s| s.settings.script_language = language)
            .is_some()
        {
            self.store_variable("script-lang", language.as_str());
        }
    }

    // Console I/O.

    fn set_channel(&self, channel: Channel, handle: FileHandle, transfer_ownership: bool) {
        let Some(core) = self.live() else {
            return;
        };
        core.log(
            "io",
            "default",
            format_args!("{channel:?} handle set to {handle:?} (owned: {transfer_ownership})"),
        );
        let released = core
            .with_state(|s| s.io.set(channel, handle, transfer_ownership))
            .flatten();
        io::close_all(released);
    }

    fn channel(&self, channel: Channel) -> FileHandle {
        self.with_state(|s| s.io.get(channel))
            .unwrap_or_else(|| channel.default_handle())
    }

    /// Install the input handle. With `transfer_ownership` the session closes
    /// it when it is replaced or the session is destroyed.
    pub fn set_input_file_handle(&self, handle: FileHandle, transfer_ownership: bool) {
        self.set_channel(Channel::Input, handle, transfer_ownership);
    }

    /// Install the output handle.
    pub fn set_output_file_handle(&self, handle: FileHandle, transfer_ownership: bool) {
        self.set_channel(Channel::Output, handle, transfer_ownership);
    }

    /// Install the error handle.
    pub fn set_error_file_handle(&self, handle: FileHandle, transfer_ownership: bool) {
        self.set_channel(Channel::Error, handle, transfer_ownership);
    }

    /// The input handle, or stdin when unset.
    #[must_use]
    pub fn input_file_handle(&self) -> FileHandle {
        self.channel(Channel::Input)
    }

    /// The output handle, or stdout when unset.
    #[must_use]
    pub fn output_file_handle(&self) -> FileHandle {
        self.channel(Channel::Output)
    }

    /// The error handle, or stderr when unset.
    #[must_use]
    pub fn error_file_handle(&self) -> FileHandle {
        self.channel(Channel::Error)
    }

    /// Snapshot the host terminal if input is the process stdin.
    pub fn save_input_terminal_state(&self) -> bool {
        if self.input_file_handle().std_stream() != Some(StdStream::Stdin) {
            return false;
        }
        let Some(snapshot) = terminal::capture() else {
            return false;
        };
        self.with_state(|s| s.saved_terminal = Some(snapshot))
            .is_some()
    }

    /// Restore a snapshot taken by [`save_input_terminal_state`].
    ///
    /// [`save_input_terminal_state`]: Self::save_input_terminal_state
    pub fn restore_input_terminal_state(&self) -> bool {
        let Some(snapshot) = self.with_state(|s| s.saved_terminal.take()).flatten() else {
            return false;
        };
        match terminal::restore(snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore terminal state");
                false
            }
        }
    }

    // Events.

    /// The session's default listener. It hears every session event.
    #[must_use]
    pub fn listener(&self) -> Option<Listener> {
        self.live().map(|core| core.listener.clone())
    }

    /// The session-level broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> Option<Broadcaster> {
        self.live().map(|core| core.broadcaster.clone())
    }

    /// Write a one-line report of a process event.
    ///
    /// State changes go to `out`; stdout and stderr payloads are copied to
    /// `out` and `err`. Events from other broadcasters are ignored.
    pub fn handle_process_event(
        &self,
        process: &Process,
        event: &Event,
        out: &FileHandle,
        err: &FileHandle,
    ) -> Result<()> {
        if process.broadcaster().id() != event.source() {
            return Ok(());
        }
        match event.data() {
            EventData::ProcessState {
                pid,
                state,
                exit_status,
            } => {
                let pid = pid.map_or_else(|| "<none>".to_string(), |p| p.to_string());
                let line = match (state, exit_status) {
                    (StateType::Exited, Some(status)) => {
                        format!("Process {pid} exited with status = {status}\n")
                    }
                    _ => format!("Process {pid} {state}\n"),
                };
                out.write_all(line.as_bytes())?;
            }
            EventData::Output(bytes) if event.kind().contains(EventMask::PROCESS_STDERR) => {
                err.write_all(bytes)?;
            }
            EventData::Output(bytes) => out.write_all(bytes)?,
            _ => {}
        }
        Ok(())
    }

    // Targets.

    /// Load an executable and add it as a target.
    ///
    /// Without a triple the default architecture applies, if set. The first
    /// target becomes the selected one. On failure nothing changes.
    pub fn create_target(
        &self,
        filename: impl AsRef<Path>,
        triple: Option<&str>,
        platform: Option<&str>,
        add_dependent_modules: bool,
    ) -> Result<Target> {
        let core = self.live().ok_or(DebugError::InvalidHandle)?;
        core.log(
            "api",
            "default",
            format_args!(
                "create_target({}, {triple:?}, {platform:?}, {add_dependent_modules})",
                filename.as_ref().display()
            ),
        );
        let triple = triple
            .filter(|t| !t.is_empty())
            .map(String::from)
            .or_else(|| registry::process().default_arch());
        let request = ModuleRequest {
            path: filename.as_ref().to_path_buf(),
            triple,
            platform: platform.filter(|p| !p.is_empty()).map(String::from),
            add_dependent_modules,
        };

        let module = core.engine.load_module(&request).inspect_err(|e| {
            core.log(
                "target",
                "default",
                format_args!("failed to load {}: {e}", request.path.display()),
            );
        })?;
        let target = new_target(core, module);
        let selected = core
            .with_state(|s| s.targets.push(target.clone()))
            .ok_or(DebugError::InvalidHandle)?;

        core.engine.target_created(&target);
        core.log(
            "target",
            "default",
            format_args!(
                "created target {} for {} ({})",
                target.id(),
                target.executable().display(),
                target.triple()
            ),
        );
        core.post(
            &core.broadcaster,
            EventMask::TARGET_ADDED,
            EventData::Target(target.id()),
        );
        if selected {
            core.post(
                &core.broadcaster,
                EventMask::TARGET_SELECTED,
                EventData::Target(target.id()),
            );
        }
        Ok(target)
    }

    /// Load an executable with detected architecture and dependents.
    pub fn create_target_simple(&self, filename: impl AsRef<Path>) -> Option<Target> {
        self.create_target(filename, None, None, true).ok()
    }

    /// Load an executable for a specific triple.
    pub fn create_target_with_file_and_triple(
        &self,
        filename: impl AsRef<Path>,
        triple: &str,
    ) -> Option<Target> {
        self.create_target(filename, Some(triple), None, true).ok()
    }

    /// Load an executable for a specific architecture name.
    pub fn create_target_with_file_and_arch(
        &self,
        filename: impl AsRef<Path>,
        arch: &str,
    ) -> Option<Target> {
        self.create_target(filename, Some(arch), None, true).ok()
    }

    /// Remove a target. False if the target is not in this session.
    pub fn delete_target(&self, target: &Target) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        core.log("api", "verbose", format_args!("delete_target({})", target.id()));
        let Some(was_selected) = core.with_state(|s| s.targets.remove(target)).flatten() else {
            return false;
        };
        core.engine.target_deleted(target);
        core.log(
            "target",
            "default",
            format_args!("deleted target {} (selected: {was_selected})", target.id()),
        );
        core.post(
            &core.broadcaster,
            EventMask::TARGET_REMOVED,
            EventData::Target(target.id()),
        );
        true
    }

    /// Target at a position.
    #[must_use]
    pub fn target_at_index(&self, index: usize) -> Option<Target> {
        self.with_state(|s| s.targets.get(index)).flatten()
    }

    /// Position of a target.
    #[must_use]
    pub fn index_of_target(&self, target: &Target) -> Option<usize> {
        self.with_state(|s| s.targets.index_of(target)).flatten()
    }

    /// The target whose process has `pid`.
    #[must_use]
    pub fn find_target_with_process_id(&self, pid: u32) -> Option<Target> {
        self.with_state(|s| s.targets.find_by_pid(pid)).flatten()
    }

    /// The first target for an executable, optionally of an architecture.
    ///
    /// A bare file name matches any directory.
    #[must_use]
    pub fn find_target_with_file_and_arch(
        &self,
        filename: impl AsRef<Path>,
        arch: Option<&str>,
    ) -> Option<Target> {
        let path = filename.as_ref();
        self.with_state(|s| s.targets.find_by_file_and_arch(path, arch))
            .flatten()
    }

    /// The target whose target or process broadcaster posted `event`.
    #[must_use]
    pub fn target_from_event(&self, event: &Event) -> Option<Target> {
        self.with_state(|s| s.targets.find_by_broadcaster(event.source()))
            .flatten()
    }

    /// Number of targets.
    #[must_use]
    pub fn num_targets(&self) -> usize {
        self.with_state(|s| s.targets.len()).unwrap_or(0)
    }

    /// The selected target.
    #[must_use]
    pub fn selected_target(&self) -> Option<Target> {
        self.with_state(|s| s.targets.selected()).flatten()
    }

    /// Select a target. A target from another session is ignored.
    pub fn set_selected_target(&self, target: &Target) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        core.log(
            "api",
            "verbose",
            format_args!("set_selected_target({})", target.id()),
        );
        let selected = core.with_state(|s| s.targets.select(target)).unwrap_or(false);
        if selected {
            core.post(
                &core.broadcaster,
                EventMask::TARGET_SELECTED,
                EventData::Target(target.id()),
            );
        } else {
            tracing::debug!(
                debugger = core.id.as_u64(),
                target = target.id().as_u64(),
                "ignoring selection of a target this session does not own"
            );
        }
        selected
    }

    // Platform.

    /// Switch the current platform.
    pub fn set_current_platform(&self, name: &str) -> Result<()> {
        let core = self.live().ok_or(DebugError::InvalidHandle)?;
        core.engine.select_platform(name)?;
        core.with_state(|s| s.platform = name.to_string());
        core.log("target", "default", format_args!("platform set to {name}"));
        Ok(())
    }

    /// Set the current platform's SDK root.
    pub fn set_current_platform_sdk_root(&self, path: impl AsRef<Path>) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        match core.engine.set_platform_sdk_root(path.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "rejected platform SDK root");
                false
            }
        }
    }

    /// The current platform name.
    #[must_use]
    pub fn current_platform(&self) -> Option<String> {
        self.with_state(|s| s.platform.clone())
    }

    // Logging.

    /// Enable categories of a log channel. False for an unknown channel or
    /// category.
    pub fn enable_log(&self, channel: &str, categories: &[&str]) -> bool {
        self.live()
            .is_some_and(|core| core.logs.enable(channel, categories))
    }

    /// Disable categories of a log channel; no categories disables it.
    pub fn disable_log(&self, channel: &str, categories: &[&str]) -> bool {
        self.live()
            .is_some_and(|core| core.logs.disable(channel, categories))
    }

    /// Route enabled log channels to `callback`.
    pub fn set_logging_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Some(core) = self.live() {
            core.logs.set_callback(Some(Arc::new(callback)));
        }
    }

    // Input dispatch.

    /// Feed console input to the top reader, or to the command interpreter
    /// when no reader is pushed.
    pub fn dispatch_input(&self, data: &[u8]) {
        let Some(core) = self.live() else {
            return;
        };
        if data.is_empty() {
            return;
        }
        let Some((top, out)) = core.with_state(|s| (s.readers.top(), s.io.get(Channel::Output)))
        else {
            return;
        };
        match top {
            Some(reader) => {
                if reader.echo() {
                    if let Err(e) = out.write_all(data) {
                        tracing::debug!(error = %e, "failed to echo input");
                    }
                }
                reader.consume(data);
                if reader.is_done() {
                    let notes = core.with_state(|s| s.readers.pop_finished());
                    input::deliver(notes.unwrap_or_default());
                }
            }
            None => {
                let lines = core
                    .with_state(|s| s.readers.take_lines(data))
                    .unwrap_or_default();
                for line in lines {
                    self.handle_command(&line);
                }
            }
        }
    }

    /// Deliver an interrupt to the top reader, or drop the pending line.
    pub fn dispatch_input_interrupt(&self) {
        let Some(core) = self.live() else {
            return;
        };
        let notes = core.with_state(|s| {
            if s.readers.is_empty() {
                s.readers.clear_pending_line();
                Vec::new()
            } else {
                s.readers.notify_top(InputReaderAction::Interrupt)
            }
        });
        input::deliver(notes.unwrap_or_default());
    }

    /// Signal end of input.
    ///
    /// The top reader sees `EndOfFile`. With no reader pushed, a pending
    /// partial line is run as a command and, if configured, an owned input
    /// handle is closed.
    pub fn dispatch_input_end_of_file(&self) {
        let Some(core) = self.live() else {
            return;
        };
        let Some(has_reader) = core.with_state(|s| !s.readers.is_empty()) else {
            return;
        };
        if has_reader {
            let notes = core.with_state(|s| s.readers.notify_top(InputReaderAction::EndOfFile));
            input::deliver(notes.unwrap_or_default());
            return;
        }
        if let Some(line) = core.with_state(|s| s.readers.take_partial_line()).flatten() {
            self.handle_command(&line);
        }
        let closing = core
            .with_state(|s| {
                if s.settings.close_input_on_eof {
                    s.io.take_owned(Channel::Input)
                } else {
                    None
                }
            })
            .flatten();
        if closing.is_some() {
            core.log("io", "default", format_args!("closing input at end of file"));
        }
        io::close_all(closing);
    }

    /// Push a reader. It becomes the only consumer of dispatched input.
    pub fn push_input_reader(&self, reader: InputReader) {
        let Some(core) = self.live() else {
            return;
        };
        let notes = core.with_state(|s| s.readers.push(reader));
        core.log("io", "verbose", format_args!("input reader pushed"));
        input::deliver(notes.unwrap_or_default());
    }

    /// Send an action to the top reader. `Done` pops it.
    pub fn notify_top_input_reader(&self, action: InputReaderAction) {
        let notes = self.with_state(|s| s.readers.notify_top(action));
        input::deliver(notes.unwrap_or_default());
    }

    /// Check if `reader` is on top of the stack.
    #[must_use]
    pub fn input_reader_is_top_reader(&self, reader: &InputReader) -> bool {
        self.with_state(|s| s.readers.is_top(reader))
            .unwrap_or(false)
    }

    // Type categories.

    /// Look up a category. Never creates one.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<TypeCategory> {
        self.with_state(|s| s.categories.get(name)).flatten()
    }

    /// Return a category, appending a new disabled one if missing.
    pub fn create_category(&self, name: &str) -> Option<TypeCategory> {
        let category = self.with_state(|s| s.categories.create(name))?;
        if let Some(core) = self.live() {
            core.log("types", "default", format_args!("category {name} ready"));
        }
        Some(category)
    }

    /// Delete a category. False for `default` or a missing name.
    pub fn delete_category(&self, name: &str) -> bool {
        self.with_state(|s| s.categories.delete(name))
            .unwrap_or(false)
    }

    /// Number of categories.
    #[must_use]
    pub fn num_categories(&self) -> usize {
        self.with_state(|s| s.categories.len()).unwrap_or(0)
    }

    /// Category at a priority position.
    #[must_use]
    pub fn category_at_index(&self, index: usize) -> Option<TypeCategory> {
        self.with_state(|s| s.categories.at(index)).flatten()
    }

    /// The permanent `default` category.
    #[must_use]
    pub fn default_category(&self) -> Option<TypeCategory> {
        self.with_state(|s| s.categories.default_category()).flatten()
    }

    /// Enable a category at the highest priority.
    pub fn enable_category(&self, name: &str) -> bool {
        self.with_state(|s| s.categories.enable(name))
            .unwrap_or(false)
    }

    /// Enable a category at a priority position.
    pub fn enable_category_at(&self, name: &str, position: usize) -> bool {
        self.with_state(|s| s.categories.enable_at(name, position))
            .unwrap_or(false)
    }

    /// Disable a category.
    pub fn disable_category(&self, name: &str) -> bool {
        self.with_state(|s| s.categories.disable(name))
            .unwrap_or(false)
    }

    /// First format rule for a type across enabled categories.
    #[must_use]
    pub fn format_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeFormat> {
        self.with_state(|s| s.categories.format_for_type(spec))
            .flatten()
    }

    /// First summary rule for a type across enabled categories.
    #[must_use]
    pub fn summary_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeSummary> {
        self.with_state(|s| s.categories.summary_for_type(spec))
            .flatten()
    }

    /// First filter rule for a type across enabled categories.
    #[must_use]
    pub fn filter_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeFilter> {
        self.with_state(|s| s.categories.filter_for_type(spec))
            .flatten()
    }

    /// First synthetic-children rule for a type across enabled categories.
    #[must_use]
    pub fn synthetic_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeSynthetic> {
        self.with_state(|s| s.categories.synthetic_for_type(spec))
            .flatten()
    }
}

fn new_target(core: &DebuggerCore, module: ModuleInfo) -> Target {
    let name = module
        .path
        .file_name()
        .map_or_else(|| module.path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let broadcaster = Broadcaster::new(format!("dbg.target.{name}"), &core.bus);
    let process_broadcaster = Broadcaster::new(format!("dbg.process.{name}"), &core.bus);
    Target::new(core.id, module, broadcaster, process_broadcaster)
}
