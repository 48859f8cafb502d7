//! Node registry and listener set.
//!
//! Both live in a single [`SyncState`] guarded by one lock in the engine, so
//! the order in which listeners see events always matches the order in which
//! the registry was mutated.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use nodesync_common::NodePath;

use crate::event::SyncEvent;
use crate::listener::SyncListener;

/// Set of paths believed to exist remotely.
///
/// Used to deduplicate add and delete notifications; it holds no node
/// contents.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: HashSet<NodePath>,
}

impl NodeRegistry {
    /// Create an empty registry with room for `capacity` paths.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: HashSet::with_capacity(capacity),
        }
    }

    /// Track `path`; returns `true` if it was not tracked before.
    pub fn insert(&mut self, path: NodePath) -> bool {
        self.nodes.insert(path)
    }

    /// Stop tracking `path`; returns `true` if it was tracked.
    pub fn remove(&mut self, path: &NodePath) -> bool {
        self.nodes.remove(path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains(path)
    }

    /// Copy of every tracked path.
    pub fn snapshot(&self) -> HashSet<NodePath> {
        self.nodes.clone()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodePath> {
        self.nodes.iter()
    }
}

/// Registered listeners, in registration order.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn SyncListener>>,
}

impl ListenerSet {
    /// Register a listener; registering the same instance again is a no-op.
    ///
    /// Returns `true` if the listener was added.
    pub fn register(&mut self, listener: Arc<dyn SyncListener>) -> bool {
        let id = Arc::as_ptr(&listener) as *const ();
        if self
            .listeners
            .iter()
            .any(|existing| Arc::as_ptr(existing) as *const () == id)
        {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Deliver `event` to every listener, in registration order.
    pub fn dispatch(&self, event: &SyncEvent) {
        debug!("notify [{}] {}", event.kind, event.path);
        for listener in &self.listeners {
            listener.process(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Engine-owned mutable state.
pub(crate) struct SyncState {
    pub(crate) nodes: NodeRegistry,
    pub(crate) listeners: ListenerSet,
}

impl SyncState {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            nodes: NodeRegistry::with_capacity(capacity),
            listeners: ListenerSet::default(),
        }
    }

    /// Track `path` and emit `Add` if it was not tracked yet.
    pub(crate) fn record_added(&mut self, path: &NodePath) -> bool {
        let added = self.nodes.insert(path.clone());
        if added {
            self.listeners.dispatch(&SyncEvent::add(path.clone()));
        }
        added
    }

    /// Untrack `path` and emit `Delete` if it was tracked.
    pub(crate) fn record_deleted(&mut self, path: &NodePath) -> bool {
        let removed = self.nodes.remove(path);
        if removed {
            self.listeners.dispatch(&SyncEvent::delete(path.clone()));
        }
        removed
    }

    /// Emit `Update` unconditionally.
    pub(crate) fn record_updated(&self, path: &NodePath) {
        self.listeners.dispatch(&SyncEvent::update(path.clone()));
    }
}
