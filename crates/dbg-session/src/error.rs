//! Error types for dbg-session.
//!
//! Lookups that fail to match return `None` rather than an error. The
//! [`DebugError`] type is reserved for validation failures that carry a reason:
//! target creation, platform selection, internal-variable writes and
//! configuration loading. Failures that happen while a target is executing are
//! reported asynchronously as events, never through this type.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The main error type for dbg-session operations.
#[derive(Debug, Error)]
pub enum DebugError {
    /// The debugger handle is empty or has been destroyed.
    #[error("invalid debugger handle")]
    InvalidHandle,

    /// The executable could not be loaded as a module.
    #[error("unable to load module '{}': {reason}", path.display())]
    ModuleLoad {
        /// Path of the module that failed to load.
        path: PathBuf,
        /// Why the module was rejected.
        reason: String,
    },

    /// An architecture name or triple was not understood.
    #[error("invalid architecture '{triple}'")]
    InvalidArchitecture {
        /// The offending triple.
        triple: String,
    },

    /// The module does not contain the requested architecture.
    #[error(
        "architecture mismatch for '{}': module is {module}, requested {requested}",
        path.display()
    )]
    ArchitectureMismatch {
        /// Path of the module.
        path: PathBuf,
        /// Architecture found in the module.
        module: String,
        /// Architecture that was requested.
        requested: String,
    },

    /// The platform name is not known to the engine.
    #[error("unknown platform: {name}")]
    UnknownPlatform {
        /// The platform name.
        name: String,
    },

    /// The SDK root for the current platform is not usable.
    #[error("invalid SDK root: {}", path.display())]
    InvalidSdkRoot {
        /// The rejected path.
        path: PathBuf,
    },

    /// The internal variable name is not in the recognized set.
    #[error("unrecognized internal variable: {name}")]
    UnknownVariable {
        /// The variable name.
        name: String,
    },

    /// The value is not valid for the internal variable's type.
    #[error("invalid value '{value}' for internal variable '{name}': {reason}")]
    InvalidVariableValue {
        /// The variable name.
        name: String,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Error reported by the engine.
    #[error("engine error: {message}")]
    Engine {
        /// Description from the engine.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for dbg-session operations.
pub type Result<T> = std::result::Result<T, DebugError>;

impl DebugError {
    /// Create a module load error.
    pub fn module_load(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create an invalid architecture error.
    pub fn invalid_architecture(triple: impl Into<String>) -> Self {
        Self::InvalidArchitecture {
            triple: triple.into(),
        }
    }

    /// Create an architecture mismatch error.
    pub fn architecture_mismatch(
        path: impl AsRef<Path>,
        module: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::ArchitectureMismatch {
            path: path.as_ref().to_path_buf(),
            module: module.into(),
            requested: requested.into(),
        }
    }

    /// Create an unknown platform error.
    pub fn unknown_platform(name: impl Into<String>) -> Self {
        Self::UnknownPlatform { name: name.into() }
    }

    /// Create an invalid SDK root error.
    pub fn invalid_sdk_root(path: impl AsRef<Path>) -> Self {
        Self::InvalidSdkRoot {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an unknown variable error.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    /// Create an invalid variable value error.
    pub fn invalid_variable_value(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidVariableValue {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Check if this error came from validating target creation input.
    #[must_use]
    pub const fn is_module_error(&self) -> bool {
        matches!(
            self,
            Self::ModuleLoad { .. }
                | Self::InvalidArchitecture { .. }
                | Self::ArchitectureMismatch { .. }
                | Self::UnknownPlatform { .. }
        )
    }

    /// Check if this is an unknown variable error.
    #[must_use]
    pub const fn is_unknown_variable(&self) -> bool {
        matches!(self, Self::UnknownVariable { .. })
    }

    /// Check if this is an invalid handle error.
    #[must_use]
    pub const fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_load_display() {
        let err = DebugError::module_load("/tmp/a.out", "no such file");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/a.out"));
        assert!(msg.contains("no such file"));
        assert!(err.is_module_error());
    }

    #[test]
    fn architecture_mismatch_display() {
        let err = DebugError::architecture_mismatch("a.out", "x86_64", "aarch64");
        let msg = err.to_string();
        assert!(msg.contains("x86_64"));
        assert!(msg.contains("aarch64"));
    }

    #[test]
    fn unknown_variable_predicate() {
        let err = DebugError::unknown_variable("no-such-setting");
        assert!(err.is_unknown_variable());
        assert!(!err.is_module_error());
        assert!(err.to_string().contains("no-such-setting"));
    }

    #[test]
    fn io_with_context_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DebugError::io_context("reading init file", io_err);
        let msg = err.to_string();
        assert!(msg.contains("reading init file"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn with_io_context_success() {
        let result: std::io::Result<i32> = Ok(7);
        let value = DebugError::with_io_context(result, "some operation").unwrap();
        assert_eq!(value, 7);
    }
}
