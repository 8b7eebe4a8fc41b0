//! Internal-variable table.
//!
//! Internal variables are process-wide settings scoped by a session's
//! instance name. Names are validated against [`KNOWN_VARIABLES`]; values are
//! validated against the variable's kind before they are stored.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::error::{DebugError, Result};
use crate::types::ScriptLanguage;

/// Kind of value an internal variable holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Free-form string.
    String,
    /// Unsigned integer.
    UInt,
    /// Boolean (`true`/`false`, `1`/`0`, `on`/`off`, `yes`/`no`).
    Bool,
    /// Scripting language name.
    ScriptLanguage,
}

/// A recognized internal variable.
#[derive(Debug, Clone, Copy)]
pub struct VariableInfo {
    /// Variable name.
    pub name: &'static str,
    /// Kind of value.
    pub kind: VariableKind,
    /// One-line description.
    pub description: &'static str,
}

/// The fixed set of recognized internal variables.
pub static KNOWN_VARIABLES: &[VariableInfo] = &[
    VariableInfo {
        name: "prompt",
        kind: VariableKind::String,
        description: "The debugger command line prompt.",
    },
    VariableInfo {
        name: "frame-format",
        kind: VariableKind::String,
        description: "Format string used when displaying stack frames.",
    },
    VariableInfo {
        name: "thread-format",
        kind: VariableKind::String,
        description: "Format string used when displaying threads.",
    },
    VariableInfo {
        name: "term-width",
        kind: VariableKind::UInt,
        description: "Maximum number of columns used for output.",
    },
    VariableInfo {
        name: "stop-line-count-before",
        kind: VariableKind::UInt,
        description: "Source lines shown before the current line on stop.",
    },
    VariableInfo {
        name: "stop-line-count-after",
        kind: VariableKind::UInt,
        description: "Source lines shown after the current line on stop.",
    },
    VariableInfo {
        name: "stop-disassembly-count",
        kind: VariableKind::UInt,
        description: "Instructions disassembled on stop.",
    },
    VariableInfo {
        name: "use-color",
        kind: VariableKind::Bool,
        description: "Whether to use ANSI color in output.",
    },
    VariableInfo {
        name: "use-external-editor",
        kind: VariableKind::Bool,
        description: "Whether to open source in an external editor.",
    },
    VariableInfo {
        name: "auto-confirm",
        kind: VariableKind::Bool,
        description: "Answer yes to every confirmation prompt.",
    },
    VariableInfo {
        name: "close-input-on-eof",
        kind: VariableKind::Bool,
        description: "Close an owned input handle at end of file.",
    },
    VariableInfo {
        name: "script-lang",
        kind: VariableKind::ScriptLanguage,
        description: "The scripting language used by the interpreter.",
    },
];

/// Look up a recognized variable by name.
#[must_use]
pub fn variable_info(name: &str) -> Option<&'static VariableInfo> {
    KNOWN_VARIABLES.iter().find(|info| info.name == name)
}

/// Parse a boolean setting value.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl VariableKind {
    /// Validate and normalize a value for this kind.
    fn normalize(self, name: &str, value: &str) -> Result<String> {
        match self {
            Self::String => Ok(value.to_string()),
            Self::UInt => value
                .trim()
                .parse::<u32>()
                .map(|n| n.to_string())
                .map_err(|e| DebugError::invalid_variable_value(name, value, e.to_string())),
            Self::Bool => parse_bool(value)
                .map(|b| b.to_string())
                .ok_or_else(|| DebugError::invalid_variable_value(name, value, "expected a boolean")),
            Self::ScriptLanguage => value
                .parse::<ScriptLanguage>()
                .map(|lang| lang.as_str().to_string())
                .map_err(|reason| DebugError::invalid_variable_value(name, value, reason)),
        }
    }
}

/// Process-wide table of `(instance, name) -> value`.
#[derive(Debug, Default)]
pub(crate) struct VariableTable {
    values: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl VariableTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Validate and store a value as given. Returns the normalized value.
    pub(crate) fn set(&self, name: &str, value: &str, instance: &str) -> Result<String> {
        let info = variable_info(name).ok_or_else(|| DebugError::unknown_variable(name))?;
        let normalized = info.kind.normalize(name, value)?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(instance.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(normalized)
    }

    /// Every value stored for an instance in normalized form, in name order.
    pub(crate) fn normalized_entries(&self, instance: &str) -> Vec<(String, String)> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let Some(vars) = values.get(instance) else {
            return Vec::new();
        };
        vars.iter()
            .filter_map(|(name, value)| {
                let info = variable_info(name)?;
                let normalized = info.kind.normalize(name, value).ok()?;
                Some((name.clone(), normalized))
            })
            .collect()
    }

    /// Read a value. Empty when the instance or the name was never set.
    pub(crate) fn get(&self, name: &str, instance: &str) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instance)
            .and_then(|vars| vars.get(name))
            .map(|v| vec![v.clone()])
            .unwrap_or_default()
    }

    /// Forget every value stored for an instance.
    pub(crate) fn remove_instance(&self, instance: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instance);
    }

    /// Forget everything.
    pub(crate) fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
