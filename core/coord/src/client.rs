//! Coordination client trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodesync_common::{NodePath, Result};

/// Node metadata as reported by the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Data version, bumped by every successful write.
    pub version: i32,
    /// Child version, bumped whenever a child is created or deleted.
    pub cversion: i32,
    /// Number of direct children.
    pub num_children: usize,
    /// Length of the node payload in bytes.
    pub data_length: usize,
    /// Owning session for ephemeral nodes.
    pub ephemeral_owner: Option<Uuid>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last data modification time.
    pub modified: DateTime<Utc>,
}

impl Stat {
    /// Whether the node is tied to a client session.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner.is_some()
    }
}

/// Durability of a created node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreateMode {
    /// Survives client disconnect.
    #[default]
    Persistent,
    /// Removed when the creating session ends.
    Ephemeral,
}

/// Operations consumed from a hierarchical coordination service.
///
/// Implementations are shared by reference between the notification loop and
/// command callers, so every method takes `&self` and concurrent calls must
/// be supported.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Backend name (e.g., "memory").
    fn name(&self) -> &str;

    /// Check whether a node exists.
    ///
    /// With `watch`, arms a one-shot watch that fires on the next creation,
    /// data change or deletion of `path`.
    ///
    /// # Returns
    /// `None` if the node does not exist.
    async fn exists(&self, path: &NodePath, watch: bool) -> Result<Option<Stat>>;

    /// List the names of a node's direct children, in no particular order.
    ///
    /// With `watch`, arms a one-shot watch that fires when the child set
    /// changes or the node is deleted.
    ///
    /// # Errors
    /// - `NoSuchPath` if the node does not exist (no watch is armed)
    /// - `NotAuthorized` if listing is refused
    async fn get_children(&self, path: &NodePath, watch: bool) -> Result<Vec<String>>;

    /// Read a node's payload.
    ///
    /// # Errors
    /// - `NoSuchPath` if the node does not exist
    async fn get_data(&self, path: &NodePath) -> Result<Vec<u8>>;

    /// Replace a node's payload.
    ///
    /// `expected_version` of `None` matches any version.
    ///
    /// # Errors
    /// - `NoSuchPath` if the node does not exist
    /// - `VersionConflict` if `expected_version` does not match
    async fn set_data(
        &self,
        path: &NodePath,
        expected_version: Option<i32>,
        data: Vec<u8>,
    ) -> Result<Stat>;

    /// Create a single node with an empty payload.
    ///
    /// # Errors
    /// - `AlreadyExists` if the node exists
    /// - `NoSuchPath` if the parent does not exist
    async fn create(&self, path: &NodePath, mode: CreateMode) -> Result<()>;

    /// Delete a single childless node.
    ///
    /// # Errors
    /// - `NoSuchPath` if the node does not exist
    /// - `NotEmpty` if the node has children
    async fn delete(&self, path: &NodePath) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_serialization() {
        let stat = Stat {
            version: 3,
            cversion: 1,
            num_children: 2,
            data_length: 5,
            ephemeral_owner: None,
            created: Utc::now(),
            modified: Utc::now(),
        };

        let json = serde_json::to_string(&stat).unwrap();
        let deserialized: Stat = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, stat);
        assert!(!deserialized.is_ephemeral());
    }

    #[test]
    fn test_default_mode_is_persistent() {
        assert_eq!(CreateMode::default(), CreateMode::Persistent);
    }
}
