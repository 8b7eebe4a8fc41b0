//! Session configuration.
//!
//! [`DebuggerConfig`] holds the initial property values of a session. It can
//! be built in code, overridden from `DBG_*` environment variables and, once
//! the session exists, adjusted further by init files.

pub mod env;
pub mod file;

use std::path::PathBuf;
use std::time::Duration;

pub use env::EnvConfig;
pub use file::{InitFile, InitFormat, SettingValue};

use crate::types::ScriptLanguage;

/// Default command prompt.
pub const DEFAULT_PROMPT: &str = "(dbg) ";

/// Default terminal width.
pub const DEFAULT_TERM_WIDTH: u32 = 80;

/// Initial settings of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig {
    /// Command prompt.
    pub prompt: String,
    /// Terminal width in columns.
    pub term_width: u32,
    /// Asynchronous command execution.
    pub async_mode: bool,
    /// ANSI color in output.
    pub use_color: bool,
    /// Open source in an external editor.
    pub use_external_editor: bool,
    /// Close an owned input handle at end of file.
    pub close_input_on_eof: bool,
    /// Scripting language.
    pub script_language: ScriptLanguage,
    /// Upper bound on how long a synchronous command waits for the target to
    /// stop. `None` waits indefinitely.
    pub sync_timeout: Option<Duration>,
    /// Global init file. `None` uses `~/.dbginit.toml`.
    pub home_init_file: Option<PathBuf>,
    /// Application init file. `None` uses `./.dbginit.toml`.
    pub app_init_file: Option<PathBuf>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            term_width: DEFAULT_TERM_WIDTH,
            async_mode: false,
            use_color: true,
            use_external_editor: false,
            close_input_on_eof: true,
            script_language: ScriptLanguage::Default,
            sync_timeout: None,
            home_init_file: None,
            app_init_file: None,
        }
    }
}

impl DebuggerConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(&EnvConfig::default())
    }

    /// Apply `DBG_*` overrides.
    #[must_use]
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(prompt) = env.get("prompt") {
            self.prompt = prompt;
        }
        if let Some(width) = env.parse("term_width") {
            self.term_width = width;
        }
        if let Some(color) = env.bool("use_color") {
            self.use_color = color;
        }
        if let Some(async_mode) = env.bool("async") {
            self.async_mode = async_mode;
        }
        if let Some(timeout) = env.duration_millis("sync_timeout_ms") {
            self.sync_timeout = Some(timeout);
        }
        if let Some(path) = env.path("init_file") {
            self.home_init_file = Some(path);
        }
        self
    }

    /// Set the prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the terminal width.
    #[must_use]
    pub const fn term_width(mut self, width: u32) -> Self {
        self.term_width = width;
        self
    }

    /// Set asynchronous mode.
    #[must_use]
    pub const fn async_mode(mut self, async_mode: bool) -> Self {
        self.async_mode = async_mode;
        self
    }

    /// Enable or disable color.
    #[must_use]
    pub const fn use_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Enable or disable closing owned input at end of file.
    #[must_use]
    pub const fn close_input_on_eof(mut self, close: bool) -> Self {
        self.close_input_on_eof = close;
        self
    }

    /// Set the scripting language.
    #[must_use]
    pub const fn script_language(mut self, language: ScriptLanguage) -> Self {
        self.script_language = language;
        self
    }

    /// Bound synchronous waits.
    #[must_use]
    pub const fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    /// Use a specific global init file.
    #[must_use]
    pub fn home_init_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_init_file = Some(path.into());
        self
    }

    /// Use a specific application init file.
    #[must_use]
    pub fn app_init_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_init_file = Some(path.into());
        self
    }

    /// The global init file to read.
    #[must_use]
    pub fn resolved_home_init_file(&self) -> Option<PathBuf> {
        self.home_init_file.clone().or_else(file::home_init_file)
    }

    /// The application init file to read.
    #[must_use]
    pub fn resolved_app_init_file(&self) -> PathBuf {
        self.app_init_file.clone().unwrap_or_else(file::app_init_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DebuggerConfig::default();
        assert_eq!(config.prompt, "(dbg) ");
        assert_eq!(config.term_width, 80);
        assert!(!config.async_mode);
        assert!(config.use_color);
        assert!(config.close_input_on_eof);
        assert!(config.sync_timeout.is_none());
    }

    #[test]
    fn env_overrides() {
        let env = EnvConfig::new("DBG_SESSION_TEST_UNSET")
            .with_override("prompt", "> ")
            .with_override("term_width", "132")
            .with_override("use_color", "0")
            .with_override("async", "yes")
            .with_override("sync_timeout_ms", "250")
            .with_override("init_file", "/tmp/custom.toml");
        let config = DebuggerConfig::new().with_env(&env);

        assert_eq!(config.prompt, "> ");
        assert_eq!(config.term_width, 132);
        assert!(!config.use_color);
        assert!(config.async_mode);
        assert_eq!(config.sync_timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            config.resolved_home_init_file(),
            Some(PathBuf::from("/tmp/custom.toml"))
        );
    }

    #[test]
    fn builder_chain() {
        let config = DebuggerConfig::new()
            .prompt("(lldb) ")
            .term_width(100)
            .script_language(ScriptLanguage::Lua)
            .app_init_file("/tmp/app.toml");
        assert_eq!(config.prompt, "(lldb) ");
        assert_eq!(config.term_width, 100);
        assert_eq!(config.script_language, ScriptLanguage::Lua);
        assert_eq!(config.resolved_app_init_file(), PathBuf::from("/tmp/app.toml"));
    }
}
