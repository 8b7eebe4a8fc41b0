//! Common types for dbg-session.
//!
//! This module defines small value types shared across the facade: session
//! identifiers, process states and scripting languages.

use std::fmt;
use std::str::FromStr;

/// Identifier of a debugger session.
///
/// Ids are small integers handed out by the process-wide handle registry and
/// are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebuggerId(u64);

impl DebuggerId {
    /// Create an id from its integer value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the inner value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DebuggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a debugged process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StateType {
    /// No process or an unknown state.
    #[default]
    Invalid,
    /// Process object is valid but not currently loaded.
    Unloaded,
    /// Connected to a remote debug server, no process yet.
    Connected,
    /// Attaching to a process.
    Attaching,
    /// Launching a process.
    Launching,
    /// Process is stopped and can be examined.
    Stopped,
    /// Process is running.
    Running,
    /// Process is single stepping.
    Stepping,
    /// Process crashed and can be examined.
    Crashed,
    /// Process has been detached.
    Detached,
    /// Process has exited.
    Exited,
    /// Process is suspended and will not resume with the others.
    Suspended,
}

impl StateType {
    /// All states, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Invalid,
        Self::Unloaded,
        Self::Connected,
        Self::Attaching,
        Self::Launching,
        Self::Stopped,
        Self::Running,
        Self::Stepping,
        Self::Crashed,
        Self::Detached,
        Self::Exited,
        Self::Suspended,
    ];

    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Unloaded => "unloaded",
            Self::Connected => "connected",
            Self::Attaching => "attaching",
            Self::Launching => "launching",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stepping => "stepping",
            Self::Crashed => "crashed",
            Self::Detached => "detached",
            Self::Exited => "exited",
            Self::Suspended => "suspended",
        }
    }

    /// Check if the process is (or is about to be) executing.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(
            self,
            Self::Attaching | Self::Launching | Self::Running | Self::Stepping
        )
    }

    /// Check if the process is not executing.
    ///
    /// States where no live process exists (exited, detached, unloaded,
    /// invalid) also count as stopped.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(
            self,
            Self::Stopped
                | Self::Crashed
                | Self::Suspended
                | Self::Invalid
                | Self::Unloaded
                | Self::Detached
                | Self::Exited
        )
    }

    /// Check if a live process exists in this state.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(
            self,
            Self::Invalid | Self::Unloaded | Self::Detached | Self::Exited
        )
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scripting language used by the command interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScriptLanguage {
    /// Scripting disabled.
    None,
    /// Python.
    Python,
    /// Lua.
    Lua,
    /// Whatever the engine prefers.
    #[default]
    Default,
}

impl ScriptLanguage {
    /// Get the language name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Python => "python",
            Self::Lua => "lua",
            Self::Default => "default",
        }
    }

    /// Look up a language by name (case-insensitive).
    ///
    /// Unrecognized names map to [`ScriptLanguage::None`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(Self::None)
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "python" => Ok(Self::Python),
            "lua" => Ok(Self::Lua),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown script language '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(StateType::Stopped.as_str(), "stopped");
        assert_eq!(StateType::Running.to_string(), "running");
    }

    #[test]
    fn running_and_stopped_are_disjoint() {
        for state in StateType::ALL {
            assert!(
                !(state.is_running() && state.is_stopped()),
                "{state} is both running and stopped"
            );
        }
    }

    #[test]
    fn stopped_states() {
        assert!(StateType::Stopped.is_stopped());
        assert!(StateType::Crashed.is_stopped());
        assert!(StateType::Exited.is_stopped());
        assert!(!StateType::Running.is_stopped());
        assert!(!StateType::Exited.is_alive());
        assert!(StateType::Stopped.is_alive());
    }

    #[test]
    fn script_language_by_name() {
        assert_eq!(ScriptLanguage::from_name("Python"), ScriptLanguage::Python);
        assert_eq!(ScriptLanguage::from_name("lua"), ScriptLanguage::Lua);
        assert_eq!(ScriptLanguage::from_name("cobol"), ScriptLanguage::None);
    }

    #[test]
    fn debugger_id_display() {
        assert_eq!(DebuggerId::from_u64(3).to_string(), "3");
        assert_eq!(DebuggerId::from_u64(3).as_u64(), 3);
    }
}
