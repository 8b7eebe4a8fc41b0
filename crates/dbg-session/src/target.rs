//! Targets and the per-session target set.
//!
//! A [`Target`] is a loaded executable module, optionally with a process.
//! Handles are cheap clones over shared state; deleting a target from its
//! session invalidates every clone.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::ModuleInfo;
use crate::event::{Broadcaster, BroadcasterId, EventData};
use crate::types::{DebuggerId, StateType};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a target within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ProcessRecord {
    pid: Option<u32>,
    state: StateType,
    exit_status: Option<i32>,
}

#[derive(Debug)]
pub(crate) struct TargetCore {
    id: TargetId,
    owner: DebuggerId,
    module: ModuleInfo,
    broadcaster: Broadcaster,
    process_broadcaster: Broadcaster,
    process: Mutex<ProcessRecord>,
    valid: AtomicBool,
}

impl TargetCore {
    fn record(&self) -> ProcessRecord {
        *self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A debug target.
#[derive(Debug, Clone)]
pub struct Target {
    core: Arc<TargetCore>,
}

impl Target {
    pub(crate) fn new(
        owner: DebuggerId,
        module: ModuleInfo,
        broadcaster: Broadcaster,
        process_broadcaster: Broadcaster,
    ) -> Self {
        Self {
            core: Arc::new(TargetCore {
                id: TargetId::next(),
                owner,
                module,
                broadcaster,
                process_broadcaster,
                process: Mutex::new(ProcessRecord::default()),
                valid: AtomicBool::new(true),
            }),
        }
    }

    /// The target id.
    #[must_use]
    pub fn id(&self) -> TargetId {
        self.core.id
    }

    /// Check if the target still belongs to a live session.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.core.valid.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        self.core.valid.store(false, Ordering::Release);
    }

    /// Id of the session that owns the target.
    #[must_use]
    pub fn debugger_id(&self) -> DebuggerId {
        self.core.owner
    }

    /// The loaded module.
    #[must_use]
    pub fn module(&self) -> &ModuleInfo {
        &self.core.module
    }

    /// Path of the executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.core.module.path
    }

    /// Architecture triple of the executable.
    #[must_use]
    pub fn triple(&self) -> &str {
        &self.core.module.triple
    }

    /// Platform the target was created for.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.core.module.platform
    }

    /// The target's event source.
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.core.broadcaster
    }

    /// The target's process.
    #[must_use]
    pub fn process(&self) -> Process {
        Process {
            target: Arc::clone(&self.core),
        }
    }

    pub(crate) fn owns_broadcaster(&self, id: BroadcasterId) -> bool {
        self.core.broadcaster.id() == id || self.core.process_broadcaster.id() == id
    }

    /// Apply a process state change to the process record.
    pub(crate) fn apply_process_event(&self, data: &EventData) {
        if let EventData::ProcessState {
            pid,
            state,
            exit_status,
        } = data
        {
            let mut record = self
                .core
                .process
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if pid.is_some() {
                record.pid = *pid;
            }
            record.state = *state;
            record.exit_status = *exit_status;
            tracing::debug!(target_id = self.core.id.0, pid = ?record.pid, %state, "process state");
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Target {}

/// The process of a target.
#[derive(Debug, Clone)]
pub struct Process {
    target: Arc<TargetCore>,
}

impl Process {
    /// Check if a live process exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.target.valid.load(Ordering::Acquire) && self.target.record().state.is_alive()
    }

    /// The process id, once launched or attached.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.target.record().pid
    }

    /// The last reported state.
    #[must_use]
    pub fn state(&self) -> StateType {
        self.target.record().state
    }

    /// Exit status, when the process has exited.
    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        self.target.record().exit_status
    }

    /// The process event source.
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.target.process_broadcaster
    }

    /// The owning target.
    #[must_use]
    pub fn target(&self) -> Target {
        Target {
            core: Arc::clone(&self.target),
        }
    }
}

/// Normalize the architecture component of a triple.
#[must_use]
pub fn normalize_arch(triple: &str) -> String {
    let arch = triple.split('-').next().unwrap_or_default().to_ascii_lowercase();
    match arch.as_str() {
        "arm64" => "aarch64".to_string(),
        "amd64" | "x64" => "x86_64".to_string(),
        "i486" | "i586" | "i686" | "x86" => "i386".to_string(),
        _ => arch,
    }
}

fn file_matches(module: &Path, query: &Path) -> bool {
    let has_dir = query
        .parent()
        .is_some_and(|parent| !parent.as_os_str().is_empty());
    if has_dir {
        module == query
    } else {
        module.file_name() == query.file_name()
    }
}

/// Ordered targets of one session with a single selection.
#[derive(Debug, Default)]
pub(crate) struct TargetSet {
    targets: Vec<Target>,
    selected: Option<TargetId>,
}

impl TargetSet {
    /// Append a target. Returns true if it became selected.
    pub(crate) fn push(&mut self, target: Target) -> bool {
        let first = self.targets.is_empty();
        if first {
            self.selected = Some(target.id());
        }
        self.targets.push(target);
        first
    }

    /// Remove a target. Returns whether it was selected, or `None` when the
    /// target is not in the set.
    pub(crate) fn remove(&mut self, target: &Target) -> Option<bool> {
        let pos = self.targets.iter().position(|t| t == target)?;
        let removed = self.targets.remove(pos);
        removed.invalidate();
        let was_selected = self.selected == Some(removed.id());
        if was_selected {
            self.selected = None;
        }
        Some(was_selected)
    }

    /// Remove every target, returning them invalidated.
    pub(crate) fn clear(&mut self) -> Vec<Target> {
        self.selected = None;
        let targets = std::mem::take(&mut self.targets);
        for target in &targets {
            target.invalidate();
        }
        targets
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<Target> {
        self.targets.get(index).cloned()
    }

    pub(crate) fn index_of(&self, target: &Target) -> Option<usize> {
        self.targets.iter().position(|t| t == target)
    }

    pub(crate) fn contains(&self, target: &Target) -> bool {
        self.index_of(target).is_some()
    }

    pub(crate) fn find_by_pid(&self, pid: u32) -> Option<Target> {
        self.targets
            .iter()
            .find(|t| t.process().pid() == Some(pid))
            .cloned()
    }

    pub(crate) fn find_by_file_and_arch(&self, path: &Path, arch: Option<&str>) -> Option<Target> {
        let wanted = arch.filter(|a| !a.is_empty()).map(normalize_arch);
        self.targets
            .iter()
            .find(|t| {
                file_matches(t.executable(), path)
                    && wanted
                        .as_deref()
                        .is_none_or(|a| normalize_arch(t.triple()) == a)
            })
            .cloned()
    }

    pub(crate) fn find_by_id(&self, id: TargetId) -> Option<Target> {
        self.targets.iter().find(|t| t.id() == id).cloned()
    }

    pub(crate) fn find_by_broadcaster(&self, id: BroadcasterId) -> Option<Target> {
        self.targets
            .iter()
            .find(|t| t.owns_broadcaster(id))
            .cloned()
    }

    /// Select a target in the set. Returns false for a foreign target.
    pub(crate) fn select(&mut self, target: &Target) -> bool {
        if self.contains(target) {
            self.selected = Some(target.id());
            true
        } else {
            false
        }
    }

    pub(crate) fn selected(&self) -> Option<Target> {
        self.find_by_id(self.selected?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::ObjectFormat;
    use crate::event::EventBus;

    fn target(path: &str, triple: &str) -> Target {
        let bus = EventBus::new();
        Target::new(
            DebuggerId::from_u64(1),
            ModuleInfo {
                path: PathBuf::from(path),
                triple: triple.to_string(),
                format: ObjectFormat::Elf,
                platform: "host".to_string(),
                dependents: Vec::new(),
            },
            Broadcaster::new("target", &bus),
            Broadcaster::new("process", &bus),
        )
    }

    #[test]
    fn first_target_is_selected() {
        let mut set = TargetSet::default();
        let a = target("/bin/a", "x86_64-unknown-linux-gnu");
        let b = target("/bin/b", "x86_64-unknown-linux-gnu");
        assert!(set.push(a.clone()));
        assert!(!set.push(b.clone()));
        assert_eq!(set.selected(), Some(a));
        assert!(set.select(&b));
        assert_eq!(set.selected(), Some(b));
    }

    #[test]
    fn removing_selected_clears_selection() {
        let mut set = TargetSet::default();
        let a = target("/bin/a", "x86_64");
        set.push(a.clone());
        assert_eq!(set.remove(&a), Some(true));
        assert!(set.selected().is_none());
        assert!(!a.is_valid());
        assert_eq!(set.remove(&a), None);
    }

    #[test]
    fn foreign_target_cannot_be_selected() {
        let mut set = TargetSet::default();
        let a = target("/bin/a", "x86_64");
        set.push(a.clone());
        let foreign = target("/bin/a", "x86_64");
        assert!(!set.select(&foreign));
        assert_eq!(set.selected(), Some(a));
    }

    #[test]
    fn find_by_file_and_arch_normalizes() {
        let mut set = TargetSet::default();
        let a = target("/opt/app/server", "arm64-apple-macosx");
        set.push(a.clone());

        assert_eq!(
            set.find_by_file_and_arch(Path::new("server"), Some("aarch64")),
            Some(a.clone())
        );
        assert_eq!(
            set.find_by_file_and_arch(Path::new("/opt/app/server"), None),
            Some(a)
        );
        assert!(set.find_by_file_and_arch(Path::new("/tmp/server"), None).is_none());
        assert!(set
            .find_by_file_and_arch(Path::new("server"), Some("x86_64"))
            .is_none());
    }

    #[test]
    fn process_state_updates_pid_lookup() {
        let mut set = TargetSet::default();
        let a = target("/bin/a", "x86_64");
        set.push(a.clone());
        assert!(set.find_by_pid(42).is_none());

        a.apply_process_event(&EventData::ProcessState {
            pid: Some(42),
            state: StateType::Stopped,
            exit_status: None,
        });
        assert_eq!(set.find_by_pid(42), Some(a.clone()));
        assert!(a.process().is_valid());
        assert_eq!(a.process().state(), StateType::Stopped);
    }

    #[test]
    fn arch_normalization() {
        assert_eq!(normalize_arch("i686-pc-linux"), "i386");
        assert_eq!(normalize_arch("AMD64"), "x86_64");
        assert_eq!(normalize_arch("riscv64gc-unknown"), "riscv64gc");
    }
}
