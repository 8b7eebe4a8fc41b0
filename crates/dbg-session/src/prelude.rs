//! Convenient re-exports for front ends.
//!
//! ```rust
//! use dbg_session::prelude::*;
//!
//! let debugger = Debugger::builder().config(DebuggerConfig::new()).build();
//! assert_eq!(debugger.prompt(), "(dbg) ");
//! ```

pub use crate::category::TypeCategory;
pub use crate::config::DebuggerConfig;
pub use crate::debugger::{CommandInterpreter, Debugger, DebuggerBuilder};
pub use crate::engine::{CommandReturn, Engine, ReturnStatus};
pub use crate::error::{DebugError, Result};
pub use crate::event::{Event, EventData, EventMask, Listener};
pub use crate::formatters::{TypeFormat, TypeNameSpecifier, TypeSummary, ValueFormat};
pub use crate::input::{Granularity, InputReader, InputReaderAction};
pub use crate::io::{FileHandle, MemoryStream};
pub use crate::target::{Process, Target};
pub use crate::types::{ScriptLanguage, StateType};
