//! Process-wide state.
//!
//! Everything that outlives a single debugger lives in one [`ProcessState`]
//! value: the handle registry that maps small integer ids to live sessions,
//! the internal-variable table and the default architecture.
//!
//! # Ordering
//!
//! The state is created on first use. [`initialize`] forces it before any
//! engine instance exists; building a debugger calls it implicitly.
//! [`terminate`] tears down in reverse: every live session is shut down first
//! (which releases its engine and owned I/O handles), and only then are the
//! variable table and default architecture cleared. Sessions created after
//! `terminate` start from a fresh table.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock, Weak};

use crate::variables::VariableTable;

/// Something the registry can shut down during [`terminate`].
pub(crate) trait Teardown: Send + Sync {
    /// Release all resources held by the entry.
    fn teardown(&self);
}

/// Table mapping integer ids to live entries.
///
/// Entries are held weakly; the registry never keeps a session alive on its
/// own. Upgraded references are always dropped outside the table lock so an
/// entry's `Drop` may unregister itself.
pub(crate) struct HandleRegistry<T> {
    entries: Mutex<BTreeMap<u64, Weak<T>>>,
    next_id: AtomicU64,
}

impl<T> HandleRegistry<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve the next id. Ids are never reused within a process.
    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register an entry under a previously allocated id.
    pub(crate) fn insert(&self, id: u64, entry: &Arc<T>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::downgrade(entry));
    }

    /// Remove an entry. Returns true if it was registered.
    pub(crate) fn unregister(&self, id: u64) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Look up a live entry by id.
    pub(crate) fn get(&self, id: u64) -> Option<Arc<T>> {
        let weak = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        weak.and_then(|w| w.upgrade())
    }

    /// All live entries in id order.
    pub(crate) fn live(&self) -> Vec<Arc<T>> {
        let weaks: Vec<Weak<T>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        weaks.iter().filter_map(Weak::upgrade).collect()
    }

    /// First live entry matching a predicate.
    pub(crate) fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        self.live().into_iter().find(|entry| predicate(entry))
    }

    /// Number of registered ids (live or not yet reaped).
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Process-scoped state shared by every debugger.
pub(crate) struct ProcessState {
    /// Live debugger sessions.
    pub(crate) debuggers: HandleRegistry<crate::debugger::DebuggerCore>,
    /// Internal variables keyed by instance name.
    pub(crate) variables: VariableTable,
    /// Architecture used when a target is created without a triple.
    default_arch: RwLock<Option<String>>,
}

impl ProcessState {
    fn new() -> Self {
        tracing::debug!("initializing process-wide debugger state");
        Self {
            debuggers: HandleRegistry::new(),
            variables: VariableTable::new(),
            default_arch: RwLock::new(None),
        }
    }

    /// The default architecture, if one was set.
    pub(crate) fn default_arch(&self) -> Option<String> {
        self.default_arch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the default architecture.
    pub(crate) fn set_default_arch(&self, arch: Option<String>) {
        *self
            .default_arch
            .write()
            .unwrap_or_else(PoisonError::into_inner) = arch;
    }
}

static PROCESS: LazyLock<ProcessState> = LazyLock::new(ProcessState::new);

/// Access the process-wide state.
pub(crate) fn process() -> &'static ProcessState {
    &PROCESS
}

/// Force creation of the process-wide state.
pub(crate) fn initialize() {
    LazyLock::force(&PROCESS);
}

/// Shut down every live session, then clear process-wide tables.
pub(crate) fn terminate() {
    let state = process();
    let live = state.debuggers.live();
    tracing::info!(sessions = live.len(), "terminating debugger state");
    for entry in &live {
        Teardown::teardown(entry.as_ref());
    }
    drop(live);
    state.variables.clear();
    state.set_default_arch(None);
}
