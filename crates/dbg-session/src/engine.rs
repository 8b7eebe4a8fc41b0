//! The seam between the session facade and a debugger engine.
//!
//! The facade never resolves symbols or controls processes itself. It hands
//! module loading and command lines to an [`Engine`], and the engine reports
//! execution-time changes back by posting events through the [`EventSink`]
//! it receives in [`Engine::attach`].

pub mod host;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use crate::debugger::EventSink;
pub use host::HostEngine;

use crate::error::DebugError;
use crate::target::{Target, TargetId};

/// Executable container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    /// ELF.
    Elf,
    /// Mach-O, thin or universal.
    MachO,
    /// PE/COFF.
    Pe,
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Elf => "elf",
            Self::MachO => "mach-o",
            Self::Pe => "pe-coff",
        })
    }
}

/// A request to load an executable as a target module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Path to the executable.
    pub path: PathBuf,
    /// Requested triple; `None` means detect from the file.
    pub triple: Option<String>,
    /// Requested platform; `None` means detect from the file.
    pub platform: Option<String>,
    /// Also resolve the modules the executable depends on.
    pub add_dependent_modules: bool,
}

/// A loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Path to the executable.
    pub path: PathBuf,
    /// Architecture triple.
    pub triple: String,
    /// Container format.
    pub format: ObjectFormat,
    /// Platform name.
    pub platform: String,
    /// Dependent modules, when requested.
    pub dependents: Vec<PathBuf>,
}

/// A command line submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// The command text.
    pub line: String,
    /// The session's selected target.
    pub selected_target: Option<TargetId>,
    /// Whether the session is in asynchronous mode.
    pub async_mode: bool,
}

/// How a command completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReturnStatus {
    /// The command completed.
    #[default]
    Success,
    /// The command resumed target execution.
    Resumed,
    /// The command failed.
    Failed,
    /// The interpreter should exit.
    Quit,
}

impl ReturnStatus {
    /// Check if the command did not fail.
    #[must_use]
    pub const fn succeeded(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// The result of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReturn {
    /// Completion status.
    pub status: ReturnStatus,
    /// Text for the output channel.
    pub output: String,
    /// Text for the error channel.
    pub error: String,
    /// Target whose process was resumed, if any.
    pub resumed_target: Option<TargetId>,
}

impl CommandReturn {
    /// A successful result with output.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// A failed result with an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: ReturnStatus::Failed,
            error: error.into(),
            ..Self::default()
        }
    }

    /// A result reporting that a target resumed execution.
    #[must_use]
    pub fn resumed(target: TargetId, output: impl Into<String>) -> Self {
        Self {
            status: ReturnStatus::Resumed,
            output: output.into(),
            resumed_target: Some(target),
            ..Self::default()
        }
    }
}

/// Failures reported by an engine while loading or configuring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The file is missing or not a recognized executable.
    #[error("unable to load '{}': {reason}", path.display())]
    Unloadable {
        /// The file.
        path: PathBuf,
        /// Why.
        reason: String,
    },

    /// The triple's architecture is unknown.
    #[error("invalid triple '{0}'")]
    InvalidTriple(String),

    /// The module does not contain the requested architecture.
    #[error("'{}' is {found}, not {requested}", path.display())]
    Mismatch {
        /// The file.
        path: PathBuf,
        /// Architectures present in the file.
        found: String,
        /// The requested architecture.
        requested: String,
    },

    /// The platform is unknown.
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    /// The SDK root is not a directory.
    #[error("'{}' is not a directory", .0.display())]
    BadSdkRoot(PathBuf),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl From<EngineError> for DebugError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unloadable { path, reason } => Self::module_load(path, reason),
            EngineError::InvalidTriple(triple) => Self::invalid_architecture(triple),
            EngineError::Mismatch {
                path,
                found,
                requested,
            } => Self::architecture_mismatch(path, found, requested),
            EngineError::UnknownPlatform(name) => Self::unknown_platform(name),
            EngineError::BadSdkRoot(path) => Self::invalid_sdk_root(path),
            EngineError::Other(message) => Self::engine(message),
        }
    }
}

/// A debugger engine.
///
/// Engines are called without any session lock held and may post events
/// from any thread.
pub trait Engine: Send + Sync {
    /// Engine name, for diagnostics.
    fn name(&self) -> &str;

    /// Receive the sink used to post events to the owning session.
    fn attach(&self, sink: EventSink) {
        let _ = sink;
    }

    /// Load an executable.
    fn load_module(&self, request: &ModuleRequest) -> Result<ModuleInfo, EngineError>;

    /// A target was added to the session.
    fn target_created(&self, target: &Target) {
        let _ = target;
    }

    /// A target was removed from the session.
    fn target_deleted(&self, target: &Target) {
        let _ = target;
    }

    /// Execute one command line.
    fn handle_command(&self, request: &CommandRequest) -> CommandReturn;

    /// Make a platform current.
    fn select_platform(&self, name: &str) -> Result<(), EngineError>;

    /// Set the SDK root of the current platform.
    fn set_platform_sdk_root(&self, path: &Path) -> Result<(), EngineError>;

    /// Drop caches that can be rebuilt. Returns the number of entries freed.
    fn release_caches(&self) -> usize {
        0
    }

    /// The session is being destroyed.
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_debug_errors() {
        let err: DebugError = EngineError::InvalidTriple("bogus".into()).into();
        assert!(matches!(err, DebugError::InvalidArchitecture { .. }));
        assert!(err.is_module_error());

        let err: DebugError = EngineError::BadSdkRoot("/nope".into()).into();
        assert!(matches!(err, DebugError::InvalidSdkRoot { .. }));
    }

    #[test]
    fn return_status() {
        assert!(ReturnStatus::Resumed.succeeded());
        assert!(!CommandReturn::failure("x").status.succeeded());
    }
}
