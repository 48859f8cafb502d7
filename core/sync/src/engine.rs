//! Sync engine mirroring a remote namespace.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nodesync_common::{Error, NodePath, Result};
use nodesync_coord::{CoordinationClient, NotificationReceiver};

use crate::listener::SyncListener;
use crate::state::SyncState;
use crate::watcher::Step;

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Subtree that `watch` bootstraps from.
    pub root: NodePath,
    /// Initial capacity of the node registry.
    pub registry_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: NodePath::root(),
            registry_capacity: 100,
        }
    }
}

/// Keeps a local view of a remote namespace current.
///
/// One engine serves one client connection. The engine does not own the
/// connection's lifecycle; it is handed a client and drops its reference
/// when discarded.
pub struct SyncEngine<C: CoordinationClient + ?Sized> {
    /// Client for remote operations.
    pub(crate) client: Arc<C>,
    /// Registry and listeners, behind a single lock.
    pub(crate) state: Mutex<SyncState>,
    /// Held for a whole bootstrap or a whole notification; the two take
    /// turns so a notification never lands between a bootstrap's existence
    /// check and its registry insert.
    pub(crate) turn: Mutex<()>,
    /// Configuration.
    config: SyncConfig,
}

impl<C: CoordinationClient + 'static> SyncEngine<C> {
    /// Create a new sync engine.
    pub fn new(client: C, config: SyncConfig) -> Self {
        Self::from_arc(Arc::new(client), config)
    }
}

impl<C: CoordinationClient + ?Sized + 'static> SyncEngine<C> {
    /// Create a new sync engine from an Arc-wrapped client.
    pub fn from_arc(client: Arc<C>, config: SyncConfig) -> Self {
        Self {
            client,
            state: Mutex::new(SyncState::new(config.registry_capacity)),
            turn: Mutex::new(()),
            config,
        }
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Register a listener for classified events.
    ///
    /// Registering the same listener instance twice has no effect; returns
    /// whether the listener was added.
    pub async fn add_listener(&self, listener: Arc<dyn SyncListener>) -> bool {
        self.state.lock().await.listeners.register(listener)
    }

    /// Whether `path` is known to exist in the mirrored view.
    pub async fn contains(&self, path: &NodePath) -> bool {
        self.state.lock().await.nodes.contains(path)
    }

    /// Copy of every path known to exist, taken at the instant of the call.
    pub async fn snapshot(&self) -> HashSet<NodePath> {
        self.state.lock().await.nodes.snapshot()
    }

    /// Known paths whose full string form matches `pattern`, sorted.
    ///
    /// # Errors
    /// - `BadArguments` if `pattern` is not a valid regular expression
    pub async fn matching(&self, pattern: &str) -> Result<Vec<NodePath>> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::BadArguments(format!("Invalid pattern {:?}: {}", pattern, e)))?;

        let state = self.state.lock().await;
        let mut matches: Vec<NodePath> = state
            .nodes
            .iter()
            .filter(|path| regex.is_match(&path.as_string()))
            .cloned()
            .collect();
        matches.sort();
        Ok(matches)
    }

    /// Synchronize from an empty registry.
    ///
    /// Discovers the whole tree under the configured root, arming watches as
    /// it goes and emitting `Add` for every node found, parents first.
    ///
    /// Safe to call while the notification loop runs: notifications queued
    /// meanwhile are handled once the bootstrap completes.
    ///
    /// # Errors
    /// - `NoSuchPath` if the configured root does not exist (a creation watch
    ///   is left armed, so the tree is picked up once it appears)
    /// - Any failure observing the root itself
    pub async fn watch(&self) -> Result<()> {
        let _turn = self.turn.lock().await;
        self.state.lock().await.nodes.clear();

        let root = self.config.root.clone();
        info!("Bootstrapping namespace view from {}", root);

        if !self.observe_node(&root).await? {
            return Err(Error::NoSuchPath(root));
        }
        self.discover(Step::Children(root)).await;

        let known = self.state.lock().await.nodes.len();
        info!("Bootstrap complete: {} nodes known", known);
        Ok(())
    }

    /// Run the notification loop on a background task.
    ///
    /// Notifications are handled one at a time and each one runs to
    /// completion; shutting the loop down only takes effect between
    /// notifications. The loop also ends when the stream closes.
    pub fn spawn(self: &Arc<Self>, notifications: NotificationReceiver) -> SyncHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.clone().run(notifications, cancel.clone()));
        SyncHandle { cancel, task }
    }

    async fn run(self: Arc<Self>, mut notifications: NotificationReceiver, cancel: CancellationToken) {
        debug!("Notification loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = notifications.recv() => match next {
                    Some(notification) => self.handle_notification(notification).await,
                    None => break,
                },
            }
        }
        debug!("Notification loop stopped");
    }
}

/// Handle to a running notification loop.
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop the loop after the notification in flight, if any, and wait
    /// for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            debug!("Notification loop ended abnormally: {}", e);
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    /// A dropped handle stops the loop without waiting for it.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
