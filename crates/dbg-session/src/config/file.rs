//! Init files.
//!
//! An init file is TOML (or JSON, by extension) with an optional `[settings]`
//! table and an optional `commands` list:
//!
//! ```toml
//! commands = ["settings show", "version"]
//!
//! [settings]
//! prompt = "(dbg) "
//! term-width = 120
//! use-color = false
//! ```
//!
//! Settings are internal variables and are validated the same way.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DebugError, Result};

/// Name of the init file looked up in the home and current directories.
pub const INIT_FILE_NAME: &str = ".dbginit.toml";

/// Init file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitFormat {
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl InitFormat {
    /// Detect the format from a path. Anything but `.json` is TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// A setting value as written in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// `true`/`false`.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A string.
    String(String),
}

impl SettingValue {
    /// The value as an internal-variable string.
    #[must_use]
    pub fn to_variable_value(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

/// Parsed contents of an init file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitFile {
    /// Internal variables to set, by name.
    pub settings: BTreeMap<String, SettingValue>,
    /// Commands to run after the session is created.
    pub commands: Vec<String>,
}

impl InitFile {
    /// Parse init file text.
    pub fn parse(content: &str, format: InitFormat) -> Result<Self> {
        match format {
            InitFormat::Toml => toml::from_str(content).map_err(|e| DebugError::config(e.to_string())),
            InitFormat::Json => {
                serde_json::from_str(content).map_err(|e| DebugError::config(e.to_string()))
            }
        }
    }

    /// Read and parse an init file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = DebugError::with_io_context(
            std::fs::read_to_string(path),
            format!("reading init file {}", path.display()),
        )?;
        Self::parse(&content, InitFormat::from_path(path)).map_err(|e| match e {
            DebugError::Config { message } => {
                DebugError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Check if the file sets nothing and runs nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.commands.is_empty()
    }
}

/// The global init file, `~/.dbginit.toml`.
#[must_use]
pub fn home_init_file() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(INIT_FILE_NAME))
}

/// The application init file, `./.dbginit.toml`.
#[must_use]
pub fn app_init_file() -> PathBuf {
    PathBuf::from(INIT_FILE_NAME)
}
