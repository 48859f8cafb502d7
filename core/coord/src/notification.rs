//! Watch notifications delivered by the coordination service.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use nodesync_common::NodePath;

/// Kind of change reported by a fired watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

/// A fired one-shot watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: ChangeKind,
    pub path: NodePath,
}

impl Notification {
    pub fn new(kind: ChangeKind, path: NodePath) -> Self {
        Self { kind, path }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.path)
    }
}

/// Sending half of a session's notification stream.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Receiving half of a session's notification stream.
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;
