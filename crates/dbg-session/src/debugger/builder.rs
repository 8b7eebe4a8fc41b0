//! Session construction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Debugger, DebuggerCore, EventSink, SessionState, Settings};
use crate::category::TypeCategoryRegistry;
use crate::config::{DebuggerConfig, InitFile};
use crate::engine::{Engine, HostEngine};
use crate::event::{Broadcaster, EventBus, EventMask, Listener};
use crate::input::InputReaderStack;
use crate::io::IoChannelSet;
use crate::log::{LogCallback, LogRegistry};
use crate::registry;
use crate::target::TargetSet;
use crate::types::DebuggerId;

/// Builds a [`Debugger`].
///
/// # Example
///
/// ```
/// use dbg_session::{Debugger, DebuggerConfig};
///
/// let mut debugger = Debugger::builder()
///     .config(DebuggerConfig::new().prompt("(test) "))
///     .build();
/// assert_eq!(debugger.prompt(), "(test) ");
/// debugger.destroy();
/// ```
#[derive(Default)]
pub struct DebuggerBuilder {
    engine: Option<Arc<dyn Engine>>,
    config: Option<DebuggerConfig>,
    source_init_files: bool,
    skip_app_init_files: bool,
    log_callback: Option<LogCallback>,
}

impl DebuggerBuilder {
    /// A builder using the host engine and environment defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific engine.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a specific configuration instead of [`DebuggerConfig::from_env`].
    #[must_use]
    pub fn config(mut self, config: DebuggerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read init files after creation.
    #[must_use]
    pub const fn source_init_files(mut self, source: bool) -> Self {
        self.source_init_files = source;
        self
    }

    /// Skip the application init file in the current directory.
    #[must_use]
    pub const fn skip_app_init_files(mut self, skip: bool) -> Self {
        self.skip_app_init_files = skip;
        self
    }

    /// Receive output of enabled log channels.
    #[must_use]
    pub fn log_callback(mut self, callback: LogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    /// Create and register the session.
    pub fn build(self) -> Debugger {
        registry::initialize();
        let config = self.config.unwrap_or_else(DebuggerConfig::from_env);
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(HostEngine::new()) as Arc<dyn Engine>);

        let process = registry::process();
        let id = DebuggerId::from_u64(process.debuggers.allocate_id());
        let bus = EventBus::new();
        let broadcaster = Broadcaster::new(format!("dbg.debugger.{id}"), &bus);
        let listener = Listener::new(format!("dbg.debugger.{id}.listener"));
        listener.listen_to_all(&broadcaster, EventMask::all());

        let instance_name = format!("debugger_{id}");
        let mut settings = Settings {
            prompt: config.prompt.clone(),
            term_width: config.term_width,
            async_mode: config.async_mode,
            use_color: config.use_color,
            use_external_editor: config.use_external_editor,
            close_input_on_eof: config.close_input_on_eof,
            script_language: config.script_language,
        };
        // Values set for this instance before it existed win over the config.
        for (name, value) in process.variables.normalized_entries(&instance_name) {
            settings.apply(&name, &value);
        }

        let state = SessionState {
            settings,
            targets: TargetSet::default(),
            io: IoChannelSet::default(),
            readers: InputReaderStack::default(),
            categories: TypeCategoryRegistry::default(),
            platform: "host".to_string(),
            saved_terminal: None,
            history: Vec::new(),
        };
        let core = Arc::new(DebuggerCore {
            id,
            instance_name,
            engine: Arc::clone(&engine),
            bus,
            broadcaster,
            listener,
            logs: LogRegistry::new(self.log_callback),
            sync_timeout: config.sync_timeout,
            state: Mutex::new(Some(state)),
        });
        process.debuggers.insert(id.as_u64(), &core);
        engine.attach(EventSink::new(&core));
        tracing::info!(
            debugger = id.as_u64(),
            engine = engine.name(),
            "debugger created"
        );

        let debugger = Debugger::from_core(core);
        if self.source_init_files {
            source_init_files(&debugger, &config, self.skip_app_init_files);
        }
        debugger
    }
}

fn source_init_files(debugger: &Debugger, config: &DebuggerConfig, skip_app: bool) {
    let home = config.resolved_home_init_file();
    if let Some(path) = &home {
        source_init_file(debugger, path);
    }
    if skip_app {
        return;
    }
    let app = config.resolved_app_init_file();
    if home.as_deref() != Some(app.as_path()) {
        source_init_file(debugger, &app);
    }
}

/// Apply one init file. Problems are logged and skipped.
fn source_init_file(debugger: &Debugger, path: &Path) {
    if !path.is_file() {
        return;
    }
    let Some(instance) = debugger.instance_name() else {
        return;
    };
    let init = match InitFile::load(path) {
        Ok(init) => init,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping init file");
            return;
        }
    };
    tracing::debug!(
        path = %path.display(),
        settings = init.settings.len(),
        commands = init.commands.len(),
        "sourcing init file"
    );
    for (name, value) in &init.settings {
        if let Err(e) = Debugger::set_internal_variable(name, &value.to_variable_value(), &instance) {
            tracing::warn!(path = %path.display(), error = %e, "ignoring init setting");
        }
    }
    for command in &init.commands {
        debugger.handle_command(command);
    }
}
