//! Diagnostic log channels.
//!
//! Every session message is traced with `tracing`. In addition, a session can
//! enable named channels (with category filters) whose messages are handed to
//! the session's log callback, which is how front ends show `log enable`
//! output to users.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives formatted log lines.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A recognized log channel.
#[derive(Debug, Clone, Copy)]
pub struct LogChannel {
    /// Channel name.
    pub name: &'static str,
    /// Categories the channel accepts.
    pub categories: &'static [&'static str],
    /// One-line description.
    pub description: &'static str,
}

/// Category enabling every message of a channel.
pub const ALL: &str = "all";
/// Category used when none is given.
pub const DEFAULT: &str = "default";
/// Category for high-volume detail.
pub const VERBOSE: &str = "verbose";

/// The recognized channels.
pub static LOG_CHANNELS: &[LogChannel] = &[
    LogChannel {
        name: "api",
        categories: &[ALL, DEFAULT, VERBOSE],
        description: "Calls into the session facade.",
    },
    LogChannel {
        name: "target",
        categories: &[ALL, DEFAULT, "modules", VERBOSE],
        description: "Target creation, deletion and selection.",
    },
    LogChannel {
        name: "process",
        categories: &[ALL, DEFAULT, "state", VERBOSE],
        description: "Process state changes.",
    },
    LogChannel {
        name: "events",
        categories: &[ALL, DEFAULT, VERBOSE],
        description: "Event broadcasting.",
    },
    LogChannel {
        name: "commands",
        categories: &[ALL, DEFAULT, VERBOSE],
        description: "Command interpreter activity.",
    },
    LogChannel {
        name: "io",
        categories: &[ALL, DEFAULT, VERBOSE],
        description: "Console I/O redirection and input readers.",
    },
    LogChannel {
        name: "types",
        categories: &[ALL, DEFAULT, VERBOSE],
        description: "Type category changes.",
    },
];

fn channel(name: &str) -> Option<&'static LogChannel> {
    LOG_CHANNELS.iter().find(|c| c.name == name)
}

fn covers(enabled: &BTreeSet<&'static str>, category: &str) -> bool {
    enabled.contains(ALL)
        || enabled.contains(category)
        || (category != VERBOSE && enabled.contains(DEFAULT))
}

#[derive(Default)]
struct LogState {
    enabled: BTreeMap<&'static str, BTreeSet<&'static str>>,
    callback: Option<LogCallback>,
}

/// Per-session channel state.
#[derive(Default)]
pub(crate) struct LogRegistry {
    state: Mutex<LogState>,
}

impl LogRegistry {
    pub(crate) fn new(callback: Option<LogCallback>) -> Self {
        Self {
            state: Mutex::new(LogState {
                enabled: BTreeMap::new(),
                callback,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve categories against a channel. `None` if any is unknown.
    fn resolve(
        channel: &'static LogChannel,
        categories: &[&str],
    ) -> Option<Vec<&'static str>> {
        categories
            .iter()
            .map(|wanted| channel.categories.iter().copied().find(|c| c == wanted))
            .collect()
    }

    /// Enable categories on a channel. An empty list enables `default`.
    ///
    /// Returns false, changing nothing, for an unknown channel or category.
    pub(crate) fn enable(&self, name: &str, categories: &[&str]) -> bool {
        let Some(channel) = channel(name) else {
            return false;
        };
        let Some(mut resolved) = Self::resolve(channel, categories) else {
            return false;
        };
        if resolved.is_empty() {
            resolved.push(DEFAULT);
        }
        self.lock()
            .enabled
            .entry(channel.name)
            .or_default()
            .extend(resolved);
        tracing::debug!(channel = name, ?categories, "log channel enabled");
        true
    }

    /// Disable categories on a channel. An empty list disables the channel.
    pub(crate) fn disable(&self, name: &str, categories: &[&str]) -> bool {
        let Some(channel) = channel(name) else {
            return false;
        };
        let Some(resolved) = Self::resolve(channel, categories) else {
            return false;
        };
        let mut state = self.lock();
        if resolved.is_empty() {
            state.enabled.remove(channel.name);
        } else if let Some(set) = state.enabled.get_mut(channel.name) {
            for category in resolved {
                set.remove(category);
            }
            if set.is_empty() {
                state.enabled.remove(channel.name);
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self, name: &str, category: &str) -> bool {
        self.lock()
            .enabled
            .get(name)
            .is_some_and(|set| covers(set, category))
    }

    pub(crate) fn set_callback(&self, callback: Option<LogCallback>) {
        self.lock().callback = callback;
    }

    /// Trace a message and forward it to the callback if the channel is on.
    pub(crate) fn emit(&self, name: &str, category: &str, message: fmt::Arguments<'_>) {
        tracing::debug!(channel = name, category, "{message}");
        let callback = {
            let state = self.lock();
            let on = state
                .enabled
                .get(name)
                .is_some_and(|set| covers(set, category));
            if on { state.callback.clone() } else { None }
        };
        if let Some(callback) = callback {
            callback(&format!("[{name}] {message}\n"));
        }
    }
}

impl fmt::Debug for LogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("LogRegistry")
            .field("enabled", &state.enabled)
            .field("callback", &state.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> (LogRegistry, Arc<Mutex<Vec<String>>>) {
        let lines: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&lines);
        let registry = LogRegistry::new(Some(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        })));
        (registry, lines)
    }

    #[test]
    fn unknown_channel_or_category() {
        let registry = LogRegistry::default();
        assert!(!registry.enable("bogus", &[]));
        assert!(!registry.enable("target", &["bogus"]));
        assert!(!registry.is_enabled("target", DEFAULT));
    }

    #[test]
    fn default_category_excludes_verbose() {
        let registry = LogRegistry::default();
        assert!(registry.enable("process", &[]));
        assert!(registry.is_enabled("process", "state"));
        assert!(!registry.is_enabled("process", VERBOSE));
        assert!(registry.enable("process", &[ALL]));
        assert!(registry.is_enabled("process", VERBOSE));
    }

    #[test]
    fn callback_only_for_enabled_channels() {
        let (registry, lines) = capture();
        registry.emit("target", DEFAULT, format_args!("created a.out"));
        assert!(lines.lock().unwrap().is_empty());

        registry.enable("target", &[]);
        registry.emit("target", DEFAULT, format_args!("created a.out"));
        assert_eq!(lines.lock().unwrap().as_slice(), ["[target] created a.out\n"]);
    }

    #[test]
    fn disable_channel() {
        let registry = LogRegistry::default();
        registry.enable("io", &[VERBOSE]);
        assert!(registry.disable("io", &[VERBOSE]));
        assert!(!registry.is_enabled("io", VERBOSE));
        assert!(!registry.disable("nope", &[]));
    }
}
