//! Integration tests for configuration and init files.
//!
//! These tests require the `mock` feature to be enabled.

#![cfg(feature = "mock")]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dbg_session::mock::MockEngine;
use dbg_session::{Debugger, DebuggerConfig, EnvConfig, InitFile, ScriptLanguage};

/// A scratch file under the temp directory, removed on drop.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn new(name: &str, content: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "dbg-session-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        Self(path)
    }

    fn missing(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dbg-session-{}-{name}-missing", std::process::id()))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn build(engine: &MockEngine, config: DebuggerConfig, source: bool) -> Debugger {
    Debugger::builder()
        .engine(Arc::new(engine.clone()))
        .config(config)
        .source_init_files(source)
        .build()
}

/// Environment overrides apply on top of the defaults.
#[test]
fn env_overrides_defaults() {
    let env = EnvConfig::new("DBG_CONFIG_TESTS_UNSET")
        .with_override("prompt", "[env] ")
        .with_override("async", "yes")
        .with_override("sync_timeout_ms", "250");
    let config = DebuggerConfig::new().with_env(&env);
    assert_eq!(config.prompt, "[env] ");
    assert!(config.async_mode);
    assert_eq!(config.sync_timeout, Some(Duration::from_millis(250)));
    assert_eq!(config.term_width, 80);
}

/// Settings from the home init file are applied and its commands run.
#[test]
fn home_init_file_is_sourced() {
    let home = ScratchFile::new(
        "home.toml",
        r#"
commands = ["version"]

[settings]
prompt = "(home) "
term-width = 100
script-lang = "lua"
"#,
    );
    let engine = MockEngine::new();
    let config = DebuggerConfig::new()
        .home_init_file(&home.0)
        .app_init_file(ScratchFile::missing("app"));
    let mut debugger = build(&engine, config, true);

    assert_eq!(debugger.prompt(), "(home) ");
    assert_eq!(debugger.terminal_width(), 100);
    assert_eq!(debugger.script_language(), ScriptLanguage::Lua);
    assert_eq!(engine.history(), vec!["version"]);
    debugger.destroy();
}

/// The application init file runs after the home file and wins.
#[test]
fn app_init_file_runs_second() {
    let home = ScratchFile::new("order-home.toml", "[settings]\nprompt = \"(home) \"\n");
    let app = ScratchFile::new(
        "order-app.json",
        r#"{"settings": {"prompt": "(app) "}, "commands": ["help"]}"#,
    );
    let engine = MockEngine::new();
    let config = DebuggerConfig::new()
        .home_init_file(&home.0)
        .app_init_file(&app.0);

    let mut debugger = build(&engine, config.clone(), true);
    assert_eq!(debugger.prompt(), "(app) ");
    assert_eq!(engine.history(), vec!["help"]);
    debugger.destroy();

    let engine = MockEngine::new();
    let mut debugger = Debugger::builder()
        .engine(Arc::new(engine.clone()))
        .config(config)
        .source_init_files(true)
        .skip_app_init_files(true)
        .build();
    assert_eq!(debugger.prompt(), "(home) ");
    assert!(engine.history().is_empty());
    debugger.destroy();
}

/// Init files are ignored unless sourcing is requested.
#[test]
fn init_files_need_opt_in() {
    let home = ScratchFile::new("optin.toml", "commands = [\"version\"]\n");
    let engine = MockEngine::new();
    let mut debugger = build(&engine, DebuggerConfig::new().home_init_file(&home.0), false);
    assert!(engine.history().is_empty());
    assert_eq!(debugger.prompt(), "(dbg) ");
    debugger.destroy();
}

/// Bad settings are skipped; the rest of the file still applies.
#[test]
fn bad_settings_are_skipped() {
    let home = ScratchFile::new(
        "partial.toml",
        r#"
commands = ["version"]

[settings]
no-such-setting = 1
term-width = "wide"
use-color = false
"#,
    );
    let engine = MockEngine::new();
    let config = DebuggerConfig::new()
        .home_init_file(&home.0)
        .app_init_file(ScratchFile::missing("partial-app"));
    let mut debugger = build(&engine, config, true);
    assert!(!debugger.use_color());
    assert_eq!(debugger.terminal_width(), 80);
    assert_eq!(engine.history(), vec!["version"]);
    debugger.destroy();
}

/// A malformed file is skipped entirely.
#[test]
fn malformed_file_is_skipped() {
    let home = ScratchFile::new("broken.toml", "commands = [\"version\"\n[settings\n");
    assert!(InitFile::load(&home.0).is_err());

    let engine = MockEngine::new();
    let config = DebuggerConfig::new()
        .home_init_file(&home.0)
        .app_init_file(ScratchFile::missing("broken-app"));
    let mut debugger = build(&engine, config, true);
    assert!(debugger.is_valid());
    assert!(engine.history().is_empty());
    debugger.destroy();
}
