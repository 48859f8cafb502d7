//! In-memory coordination service for testing and local use.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use nodesync_common::{Error, NodePath, Result};

use crate::client::{CoordinationClient, CreateMode, Stat};
use crate::notification::{ChangeKind, Notification, NotificationReceiver, NotificationSender};

/// A node held in memory.
#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    version: i32,
    cversion: i32,
    ephemeral_owner: Option<Uuid>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    children: BTreeSet<String>,
}

impl Node {
    fn new(ephemeral_owner: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            data: Vec::new(),
            version: 0,
            cversion: 0,
            ephemeral_owner,
            created: now,
            modified: now,
            children: BTreeSet::new(),
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            cversion: self.cversion,
            num_children: self.children.len(),
            data_length: self.data.len(),
            ephemeral_owner: self.ephemeral_owner,
            created: self.created,
            modified: self.modified,
        }
    }
}

/// Shared namespace state: the tree, armed watches and open sessions.
struct Namespace {
    nodes: HashMap<NodePath, Node>,
    /// Armed by `exists`: fire on create, data change or delete.
    node_watches: HashMap<NodePath, HashSet<Uuid>>,
    /// Armed by `get_children`: fire on child set change or delete.
    child_watches: HashMap<NodePath, HashSet<Uuid>>,
    sessions: HashMap<Uuid, NotificationSender>,
    restricted: HashSet<NodePath>,
}

impl Namespace {
    fn with_root() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodePath::root(), Node::new(None));
        Self {
            nodes,
            node_watches: HashMap::new(),
            child_watches: HashMap::new(),
            sessions: HashMap::new(),
            restricted: HashSet::new(),
        }
    }

    fn ensure_open(&self, session: Uuid) -> Result<()> {
        if self.sessions.contains_key(&session) {
            Ok(())
        } else {
            Err(Error::ConnectionLoss(format!("Session {} is closed", session)))
        }
    }

    fn node(&self, path: &NodePath) -> Result<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| Error::NoSuchPath(path.clone()))
    }

    fn notify(&self, sessions: HashSet<Uuid>, kind: ChangeKind, path: &NodePath) {
        for session in sessions {
            let Some(sink) = self.sessions.get(&session) else {
                continue;
            };
            trace!(session = %session, "Firing {:?} for {}", kind, path);
            if sink.send(Notification::new(kind, path.clone())).is_err() {
                trace!(session = %session, "Notification receiver dropped");
            }
        }
    }

    fn create_node(&mut self, path: &NodePath, mode: CreateMode, session: Uuid) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(Error::AlreadyExists(path.clone()));
        };
        if self.nodes.contains_key(path) {
            return Err(Error::AlreadyExists(path.clone()));
        }

        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| Error::NoSuchPath(parent.clone()))?;
        if parent_node.ephemeral_owner.is_some() {
            return Err(Error::IllegalOperation(format!(
                "Ephemeral node {} cannot have children",
                parent
            )));
        }
        parent_node.children.insert(name.to_string());
        parent_node.cversion += 1;

        let owner = match mode {
            CreateMode::Persistent => None,
            CreateMode::Ephemeral => Some(session),
        };
        self.nodes.insert(path.clone(), Node::new(owner));

        if let Some(watchers) = self.node_watches.remove(path) {
            self.notify(watchers, ChangeKind::NodeCreated, path);
        }
        if let Some(watchers) = self.child_watches.remove(&parent) {
            self.notify(watchers, ChangeKind::NodeChildrenChanged, &parent);
        }
        Ok(())
    }

    fn delete_node(&mut self, path: &NodePath) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(Error::IllegalOperation(
                "Cannot delete the root node".to_string(),
            ));
        };
        if !self.node(path)?.children.is_empty() {
            return Err(Error::NotEmpty(path.clone()));
        }

        self.nodes.remove(path);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(name);
            parent_node.cversion += 1;
        }

        let mut watchers = self.node_watches.remove(path).unwrap_or_default();
        watchers.extend(self.child_watches.remove(path).unwrap_or_default());
        self.notify(watchers, ChangeKind::NodeDeleted, path);

        if let Some(watchers) = self.child_watches.remove(&parent) {
            self.notify(watchers, ChangeKind::NodeChildrenChanged, &parent);
        }
        Ok(())
    }

    fn set_node_data(
        &mut self,
        path: &NodePath,
        expected_version: Option<i32>,
        data: Vec<u8>,
    ) -> Result<Stat> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| Error::NoSuchPath(path.clone()))?;
        if let Some(expected) = expected_version {
            if expected != node.version {
                return Err(Error::VersionConflict {
                    path: path.clone(),
                    expected,
                    actual: node.version,
                });
            }
        }

        node.data = data;
        node.version += 1;
        node.modified = Utc::now();
        let stat = node.stat();

        if let Some(watchers) = self.node_watches.remove(path) {
            self.notify(watchers, ChangeKind::NodeDataChanged, path);
        }
        Ok(stat)
    }

    fn close_session(&mut self, session: Uuid) {
        if self.sessions.remove(&session).is_none() {
            return;
        }
        for watchers in self
            .node_watches
            .values_mut()
            .chain(self.child_watches.values_mut())
        {
            watchers.remove(&session);
        }

        let mut owned: Vec<NodePath> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        owned.sort_by_key(|path| std::cmp::Reverse(path.depth()));

        for path in owned {
            if let Err(e) = self.delete_node(&path) {
                debug!("Failed to expire ephemeral node {}: {}", path, e);
            }
        }
        debug!(session = %session, "Session closed");
    }
}

/// Persisted form of a node.
#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    /// Base64 payload.
    data: String,
    version: i32,
    cversion: i32,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredNamespace {
    nodes: BTreeMap<NodePath, StoredNode>,
}

/// In-memory coordination service.
///
/// Clones share the same namespace. Clients talk to it through sessions
/// opened with [`MemoryCoordinator::session`]; each session has its own
/// notification stream and owns the ephemeral nodes it creates.
#[derive(Clone)]
pub struct MemoryCoordinator {
    namespace: Arc<Mutex<Namespace>>,
}

impl MemoryCoordinator {
    /// Create a namespace holding only the root node.
    pub fn new() -> Self {
        Self {
            namespace: Arc::new(Mutex::new(Namespace::with_root())),
        }
    }

    /// Open a new session and its notification stream.
    pub fn session(&self) -> (MemorySession, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.namespace.lock().sessions.insert(id, tx);
        debug!(session = %id, "Session opened");

        let session = MemorySession {
            id,
            namespace: self.namespace.clone(),
        };
        (session, rx)
    }

    /// Refuse child listings of `path` with `NotAuthorized`.
    pub fn restrict(&self, path: &NodePath) {
        self.namespace.lock().restricted.insert(path.clone());
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.namespace.lock().nodes.len()
    }

    /// Serialize the persistent nodes to JSON.
    ///
    /// Ephemeral nodes are skipped; they cannot outlive their session.
    pub fn to_json(&self) -> Result<String> {
        let namespace = self.namespace.lock();
        let nodes = namespace
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner.is_none())
            .map(|(path, node)| {
                let stored = StoredNode {
                    data: STANDARD.encode(&node.data),
                    version: node.version,
                    cversion: node.cversion,
                    created: node.created,
                    modified: node.modified,
                };
                (path.clone(), stored)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&StoredNamespace { nodes })?)
    }

    /// Rebuild a namespace from [`MemoryCoordinator::to_json`] output.
    ///
    /// # Errors
    /// - `Serialization` if the document is malformed or a node's parent is
    ///   missing
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredNamespace = serde_json::from_str(json)?;
        let mut namespace = Namespace::with_root();

        // BTreeMap order puts every parent before its children.
        for (path, stored_node) in stored.nodes {
            let data = STANDARD
                .decode(&stored_node.data)
                .map_err(|e| Error::Serialization(format!("Bad payload for {}: {}", path, e)))?;
            let mut node = Node::new(None);
            node.data = data;
            node.version = stored_node.version;
            node.cversion = stored_node.cversion;
            node.created = stored_node.created;
            node.modified = stored_node.modified;

            if let (Some(parent), Some(name)) = (path.parent(), path.name()) {
                let parent_node = namespace.nodes.get_mut(&parent).ok_or_else(|| {
                    Error::Serialization(format!("Missing parent for stored node {}", path))
                })?;
                parent_node.children.insert(name.to_string());
            } else if let Some(root) = namespace.nodes.get(&path) {
                node.children = root.children.clone();
            }
            namespace.nodes.insert(path, node);
        }

        Ok(Self {
            namespace: Arc::new(Mutex::new(namespace)),
        })
    }
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// A client session against a [`MemoryCoordinator`].
///
/// Dropping the session closes it, which deletes its ephemeral nodes.
pub struct MemorySession {
    id: Uuid,
    namespace: Arc<Mutex<Namespace>>,
}

impl MemorySession {
    /// Session identifier, reported as the owner of its ephemeral nodes.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.namespace.lock().sessions.contains_key(&self.id)
    }

    /// Close the session, expiring its ephemeral nodes and watches.
    pub fn close(&self) {
        self.namespace.lock().close_session(self.id);
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl CoordinationClient for MemorySession {
    fn name(&self) -> &str {
        "memory"
    }

    async fn exists(&self, path: &NodePath, watch: bool) -> Result<Option<Stat>> {
        let mut namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        if watch {
            namespace
                .node_watches
                .entry(path.clone())
                .or_default()
                .insert(self.id);
        }
        Ok(namespace.nodes.get(path).map(Node::stat))
    }

    async fn get_children(&self, path: &NodePath, watch: bool) -> Result<Vec<String>> {
        let mut namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        let children: Vec<String> = namespace.node(path)?.children.iter().cloned().collect();
        if namespace.restricted.contains(path) {
            return Err(Error::NotAuthorized(path.clone()));
        }
        if watch {
            namespace
                .child_watches
                .entry(path.clone())
                .or_default()
                .insert(self.id);
        }
        Ok(children)
    }

    async fn get_data(&self, path: &NodePath) -> Result<Vec<u8>> {
        let namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        Ok(namespace.node(path)?.data.clone())
    }

    async fn set_data(
        &self,
        path: &NodePath,
        expected_version: Option<i32>,
        data: Vec<u8>,
    ) -> Result<Stat> {
        let mut namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        namespace.set_node_data(path, expected_version, data)
    }

    async fn create(&self, path: &NodePath, mode: CreateMode) -> Result<()> {
        let mut namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        namespace.create_node(path, mode, self.id)
    }

    async fn delete(&self, path: &NodePath) -> Result<()> {
        let mut namespace = self.namespace.lock();
        namespace.ensure_open(self.id)?;
        namespace.delete_node(path)
    }
}
