//! Event broadcasting and listeners.
//!
//! Every session owns one [`EventBus`]. The session, its targets and their
//! processes each carry a [`Broadcaster`] on that bus. A [`Listener`]
//! subscribes either to one broadcaster or to the whole bus, with an
//! [`EventMask`] selecting the kinds it cares about. Delivery is fan-out:
//! every matching listener receives its own copy.
//!
//! Events from one source reach a listener in the order they were posted. The
//! bus holds its lock across the whole fan-out, so concurrent posters are
//! serialized.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use bitflags::bitflags;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::engine::ReturnStatus;
use crate::target::TargetId;
use crate::types::StateType;

bitflags! {
    /// Kinds of events a listener can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// A target was added to the session.
        const TARGET_ADDED = 1 << 0;
        /// A target was removed from the session.
        const TARGET_REMOVED = 1 << 1;
        /// The selected target changed.
        const TARGET_SELECTED = 1 << 2;
        /// A process changed state.
        const PROCESS_STATE_CHANGED = 1 << 3;
        /// A process wrote to its standard output.
        const PROCESS_STDOUT = 1 << 4;
        /// A process wrote to its standard error.
        const PROCESS_STDERR = 1 << 5;
        /// A process was interrupted.
        const PROCESS_INTERRUPT = 1 << 6;
        /// A breakpoint was hit.
        const BREAKPOINT_HIT = 1 << 7;
        /// Modules were loaded into a target.
        const MODULES_LOADED = 1 << 8;
        /// Modules were unloaded from a target.
        const MODULES_UNLOADED = 1 << 9;
        /// A command finished executing.
        const COMMAND_FINISHED = 1 << 10;
        /// A warning from the engine.
        const WARNING = 1 << 11;
        /// An error from the engine.
        const ERROR = 1 << 12;

        /// Everything a process broadcaster emits.
        const PROCESS_ALL = Self::PROCESS_STATE_CHANGED.bits()
            | Self::PROCESS_STDOUT.bits()
            | Self::PROCESS_STDERR.bits()
            | Self::PROCESS_INTERRUPT.bits();
    }
}

static NEXT_BROADCASTER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identity of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BroadcasterId(u64);

impl BroadcasterId {
    fn next() -> Self {
        Self(NEXT_BROADCASTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    /// No payload.
    None,
    /// A target was added, removed or selected.
    Target(TargetId),
    /// A process state change.
    ProcessState {
        /// Process id, once known.
        pid: Option<u32>,
        /// The new state.
        state: StateType,
        /// Exit status when the state is `Exited`.
        exit_status: Option<i32>,
    },
    /// Bytes written by a process.
    Output(Bytes),
    /// A breakpoint hit.
    Breakpoint {
        /// Breakpoint id.
        id: u32,
        /// Human-readable location.
        location: String,
    },
    /// Modules loaded or unloaded.
    Modules(Vec<PathBuf>),
    /// A command completed.
    Command {
        /// The command line.
        line: String,
        /// How it completed.
        status: ReturnStatus,
    },
    /// A warning or error message.
    Message(String),
}

/// An event posted by the engine or the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    source: BroadcasterId,
    kind: EventMask,
    data: EventData,
    sequence: u64,
}

impl Event {
    /// Create an event. `kind` should be a single bit.
    #[must_use]
    pub fn new(source: BroadcasterId, kind: EventMask, data: EventData) -> Self {
        Self {
            source,
            kind,
            data,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The broadcaster that posted the event.
    #[must_use]
    pub const fn source(&self) -> BroadcasterId {
        self.source
    }

    /// The event kind.
    #[must_use]
    pub const fn kind(&self) -> EventMask {
        self.kind
    }

    /// The payload.
    #[must_use]
    pub const fn data(&self) -> &EventData {
        &self.data
    }

    /// Process-wide posting order.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The process state carried by a state-change event.
    #[must_use]
    pub const fn process_state(&self) -> Option<StateType> {
        match &self.data {
            EventData::ProcessState { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// Output bytes carried by a stdout/stderr event.
    #[must_use]
    pub const fn output(&self) -> Option<&Bytes> {
        match &self.data {
            EventData::Output(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Source(BroadcasterId),
    Bus(u64),
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    scope: Scope,
    mask: EventMask,
}

#[derive(Debug, Default)]
struct ListenerState {
    queue: VecDeque<Event>,
    subscriptions: Vec<Subscription>,
}

#[derive(Debug)]
struct ListenerInner {
    name: String,
    state: Mutex<ListenerState>,
    ready: Condvar,
    notify: Notify,
}

impl ListenerInner {
    fn state(&self) -> std::sync::MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, bus: u64, event: &Event) -> bool {
        let mut state = self.state();
        let wanted = state.subscriptions.iter().any(|sub| {
            let in_scope = match sub.scope {
                Scope::Source(id) => id == event.source,
                Scope::Bus(id) => id == bus,
            };
            in_scope && sub.mask.intersects(event.kind)
        });
        if wanted {
            state.queue.push_back(event.clone());
            drop(state);
            self.ready.notify_all();
            self.notify.notify_waiters();
        }
        wanted
    }
}

/// A queue receiving the events it subscribed to.
///
/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct Listener {
    inner: Arc<ListenerInner>,
}

impl Listener {
    /// Create a listener with no subscriptions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                name: name.into(),
                state: Mutex::new(ListenerState::default()),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// The listener name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn subscribe(&self, bus: &EventBus, scope: Scope, mask: EventMask) -> EventMask {
        bus.register(&self.inner);
        let mut state = self.inner.state();
        if let Some(sub) = state.subscriptions.iter_mut().find(|s| s.scope == scope) {
            sub.mask |= mask;
        } else {
            state.subscriptions.push(Subscription { scope, mask });
        }
        mask
    }

    /// Subscribe to events from one broadcaster. Returns the bits acquired.
    pub fn start_listening_for_events(&self, broadcaster: &Broadcaster, mask: EventMask) -> EventMask {
        tracing::debug!(
            listener = %self.inner.name,
            source = broadcaster.id.0,
            mask = mask.bits(),
            "start listening"
        );
        self.subscribe(&broadcaster.bus, Scope::Source(broadcaster.id), mask)
    }

    /// Subscribe to events from every broadcaster sharing `broadcaster`'s bus.
    pub fn listen_to_all(&self, broadcaster: &Broadcaster, mask: EventMask) -> EventMask {
        self.subscribe(&broadcaster.bus, Scope::Bus(broadcaster.bus.id), mask)
    }

    /// Drop event kinds from a broadcaster subscription.
    ///
    /// Returns true if any subscribed bit was removed.
    pub fn stop_listening_for_events(&self, broadcaster: &Broadcaster, mask: EventMask) -> bool {
        let scope = Scope::Source(broadcaster.id);
        let mut state = self.inner.state();
        let Some(pos) = state.subscriptions.iter().position(|s| s.scope == scope) else {
            return false;
        };
        let sub = &mut state.subscriptions[pos];
        let removed = sub.mask.intersects(mask);
        sub.mask.remove(mask);
        if sub.mask.is_empty() {
            state.subscriptions.remove(pos);
        }
        removed
    }

    /// Check if any subscription is active.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        !self.inner.state().subscriptions.is_empty()
    }

    /// Block until an event arrives or the timeout elapses.
    ///
    /// `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Event> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state();
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Some(event);
            }
            match deadline {
                None => {
                    state = self
                        .inner
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    state = self
                        .inner
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Async version of [`Listener::wait`].
    pub async fn wait_async(&self, timeout: Option<Duration>) -> Option<Event> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            let notified = self.inner.notify.notified();
            if let Some(event) = self.try_next() {
                return Some(event);
            }
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_next();
                    }
                }
            }
        }
    }

    /// Pop the next event without blocking.
    #[must_use]
    pub fn try_next(&self) -> Option<Event> {
        self.inner.state().queue.pop_front()
    }

    /// Look at the next event without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<Event> {
        self.inner.state().queue.front().cloned()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard queued events.
    pub fn clear(&self) {
        self.inner.state().queue.clear();
    }

    /// Check if both values refer to the same listener.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Fan-out point shared by the broadcasters of one session.
#[derive(Debug)]
pub(crate) struct EventBus {
    id: u64,
    listeners: Mutex<Vec<Weak<ListenerInner>>>,
}

impl EventBus {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn register(&self, listener: &Arc<ListenerInner>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let weak = Arc::downgrade(listener);
        if !listeners.iter().any(|l| l.ptr_eq(&weak)) {
            listeners.push(weak);
        }
    }

    /// Deliver an event to every matching listener. Returns the number of
    /// listeners that received it.
    pub(crate) fn post(&self, event: &Event) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|l| l.deliver(self.id, event))
            .count()
    }
}

/// An event source.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    id: BroadcasterId,
    name: String,
    bus: Arc<EventBus>,
}

impl Broadcaster {
    pub(crate) fn new(name: impl Into<String>, bus: &Arc<EventBus>) -> Self {
        Self {
            id: BroadcasterId::next(),
            name: name.into(),
            bus: Arc::clone(bus),
        }
    }

    /// The broadcaster id.
    #[must_use]
    pub const fn id(&self) -> BroadcasterId {
        self.id
    }

    /// The broadcaster name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post an event from this broadcaster.
    pub(crate) fn broadcast(&self, kind: EventMask, data: EventData) -> Event {
        let event = Event::new(self.id, kind, data);
        let delivered = self.bus.post(&event);
        tracing::trace!(
            source = %self.name,
            kind = kind.bits(),
            sequence = event.sequence,
            delivered,
            "event posted"
        );
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcaster(name: &str) -> Broadcaster {
        Broadcaster::new(name, &EventBus::new())
    }

    #[test]
    fn mask_filters_delivery() {
        let source = broadcaster("process");
        let listener = Listener::new("test");
        listener.start_listening_for_events(&source, EventMask::PROCESS_STATE_CHANGED);

        source.broadcast(EventMask::PROCESS_STDOUT, EventData::None);
        assert!(listener.is_empty());

        source.broadcast(EventMask::PROCESS_STATE_CHANGED, EventData::None);
        assert_eq!(listener.len(), 1);
    }

    #[test]
    fn fan_out_to_every_listener() {
        let source = broadcaster("target");
        let a = Listener::new("a");
        let b = Listener::new("b");
        a.start_listening_for_events(&source, EventMask::all());
        b.start_listening_for_events(&source, EventMask::all());

        source.broadcast(EventMask::TARGET_ADDED, EventData::None);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn wildcard_scope_covers_bus() {
        let bus = EventBus::new();
        let first = Broadcaster::new("first", &bus);
        let second = Broadcaster::new("second", &bus);
        let other = broadcaster("other");
        let listener = Listener::new("all");
        listener.listen_to_all(&first, EventMask::all());

        second.broadcast(EventMask::WARNING, EventData::Message("w".into()));
        other.broadcast(EventMask::WARNING, EventData::None);
        let event = listener.try_next().unwrap();
        assert_eq!(event.source(), second.id());
        assert!(listener.is_empty());
    }

    #[test]
    fn stop_listening_removes_bits() {
        let source = broadcaster("s");
        let listener = Listener::new("l");
        listener.start_listening_for_events(&source, EventMask::PROCESS_ALL);
        assert!(listener.stop_listening_for_events(&source, EventMask::PROCESS_ALL));
        assert!(!listener.is_listening());
        assert!(!listener.stop_listening_for_events(&source, EventMask::PROCESS_ALL));
    }

    #[test]
    fn wait_times_out() {
        let listener = Listener::new("idle");
        let start = Instant::now();
        assert!(listener.wait(Some(Duration::from_millis(30))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn peek_does_not_consume() {
        let source = broadcaster("s");
        let listener = Listener::new("l");
        listener.start_listening_for_events(&source, EventMask::ERROR);
        source.broadcast(EventMask::ERROR, EventData::Message("bad".into()));

        assert!(listener.peek().is_some());
        assert_eq!(listener.len(), 1);
        listener.clear();
        assert!(listener.peek().is_none());
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let bus = EventBus::new();
        let source = Broadcaster::new("s", &bus);
        let listener = Listener::new("temp");
        listener.start_listening_for_events(&source, EventMask::all());
        drop(listener);
        assert_eq!(bus.post(&Event::new(source.id(), EventMask::ERROR, EventData::None)), 0);
    }
}
