//! Classified namespace events delivered to listeners.

use serde::{Deserialize, Serialize};
use std::fmt;

use nodesync_common::NodePath;

/// Semantic kind of a remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The node came into existence (once per existence lifetime).
    Add,
    /// The node's data changed. May arrive for a node already deleted.
    Update,
    /// A tracked node was deleted.
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// An immutable classified event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncEvent {
    pub kind: EventKind,
    pub path: NodePath,
}

impl SyncEvent {
    pub fn add(path: NodePath) -> Self {
        Self {
            kind: EventKind::Add,
            path,
        }
    }

    pub fn update(path: NodePath) -> Self {
        Self {
            kind: EventKind::Update,
            path,
        }
    }

    pub fn delete(path: NodePath) -> Self {
        Self {
            kind: EventKind::Delete,
            path,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = SyncEvent::delete(NodePath::parse("/a/b").unwrap());
        assert_eq!(event.to_string(), "delete /a/b");
        assert_eq!(SyncEvent::add(NodePath::root()).to_string(), "add /");
    }

    #[test]
    fn test_event_serialization() {
        let event = SyncEvent::update(NodePath::parse("/cfg").unwrap());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"kind":"update","path":"/cfg"}"#);
    }
}
