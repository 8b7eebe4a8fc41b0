//! Scripted engine for testing front ends.
//!
//! [`MockEngine`] stands in for a real debugger engine. Modules are
//! registered by path instead of read from disk, command responses can be
//! scripted, and a small built-in command set simulates a process that runs
//! and stops, so synchronous and asynchronous command handling can be
//! exercised without a real inferior.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dbg_session::Debugger;
//! use dbg_session::mock::{MockEngine, MockModule};
//!
//! let engine = MockEngine::new().with_module("/bin/app", MockModule::new("x86_64-unknown-linux"));
//! let mut debugger = Debugger::builder().engine(Arc::new(engine.clone())).build();
//!
//! let target = debugger.create_target("/bin/app", None, None, false).unwrap();
//! assert_eq!(target.triple(), "x86_64-unknown-linux");
//! debugger.destroy();
//! assert_eq!(engine.shutdown_count(), 1);
//! ```

pub mod engine;
pub mod module;

pub use engine::MockEngine;
pub use module::MockModule;

use crate::engine::CommandReturn;

/// A canned reply for a command line.
#[must_use]
pub fn reply(output: &str) -> CommandReturn {
    CommandReturn::success(output)
}

/// A canned failure for a command line.
#[must_use]
pub fn fail(error: &str) -> CommandReturn {
    CommandReturn::failure(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReturnStatus;

    #[test]
    fn canned_replies() {
        assert_eq!(reply("ok\n").status, ReturnStatus::Success);
        assert_eq!(fail("no\n").error, "no\n");
    }
}
