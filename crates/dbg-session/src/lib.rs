//! dbg-session: the session facade of an interactive debugger.
//!
//! A [`Debugger`] is the root object a front end holds. It owns targets,
//! redirects console I/O, multiplexes input between stacked readers and the
//! command interpreter, carries a session event bus, and keeps the
//! session's type-formatting categories. Symbol loading, process control and
//! command execution are delegated to an [`Engine`].
//!
//! # Features
//!
//! - **Shared handles**: clones of a [`Debugger`], [`Target`] or
//!   [`Listener`] alias the same state
//! - **Event bus** with per-source ordering and blocking or async waits
//! - **Console multiplexing** through an [`InputReader`] stack
//! - **Type categories** with priority-ordered lookup
//! - **Mock engine** for testing front ends (feature: `mock`)
//!
//! # Example
//!
//! ```rust
//! use dbg_session::prelude::*;
//!
//! Debugger::initialize();
//! let mut debugger = Debugger::create(false, None);
//! assert!(debugger.is_valid());
//! assert_eq!(debugger.num_targets(), 0);
//!
//! let out = MemoryStream::new();
//! debugger.set_output_file_handle(FileHandle::new(out.clone()), true);
//! debugger.handle_command("version");
//! assert!(out.contents().starts_with("dbg-session"));
//!
//! debugger.destroy();
//! assert!(!debugger.is_valid());
//! ```

pub mod category;
pub mod config;
pub mod debugger;
pub mod engine;
pub mod error;
pub mod event;
pub mod formatters;
pub mod input;
pub mod io;
pub mod log;
pub mod prelude;
pub mod target;
pub mod terminal;
pub mod types;
pub mod variables;

mod registry;

/// Scripted engine for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use category::{DEFAULT_CATEGORY, TypeCategory};
pub use config::{DebuggerConfig, EnvConfig, InitFile};
pub use debugger::{CommandInterpreter, Debugger, DebuggerBuilder, EventSink};
pub use engine::{
    CommandRequest, CommandReturn, Engine, EngineError, HostEngine, ModuleInfo, ModuleRequest,
    ObjectFormat, ReturnStatus,
};
pub use error::{DebugError, Result};
pub use event::{Broadcaster, BroadcasterId, Event, EventData, EventMask, Listener};
pub use formatters::{
    SummarySource, TypeFilter, TypeFormat, TypeNameSpecifier, TypeOptions, TypeSummary,
    TypeSynthetic, ValueFormat,
};
pub use input::{Granularity, InputReader, InputReaderAction, InputReaderBuilder};
pub use io::{Channel, FileHandle, MemoryStream, StdStream, Stream};
pub use log::{LOG_CHANNELS, LogCallback, LogChannel};
pub use target::{Process, Target, TargetId};
pub use types::{DebuggerId, ScriptLanguage, StateType};
pub use variables::{KNOWN_VARIABLES, VariableInfo, VariableKind};

/// Name and version of this library.
#[must_use]
pub const fn version_string() -> &'static str {
    concat!("dbg-session ", env!("CARGO_PKG_VERSION"))
}
