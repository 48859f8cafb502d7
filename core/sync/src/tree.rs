//! Tree-mutating operations and pass-through reads.
//!
//! Mutations go straight to the coordination service; the registry learns
//! about their effects later through the notification path like any other
//! remote change.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use nodesync_common::{Error, NodePath, Result};
use nodesync_coord::{CoordinationClient, CreateMode, Stat};

use crate::engine::SyncEngine;

impl<C: CoordinationClient + ?Sized + 'static> SyncEngine<C> {
    /// Get a node's metadata, `None` if it does not exist.
    pub async fn get_stat(&self, path: &NodePath) -> Result<Option<Stat>> {
        self.client.exists(path, false).await
    }

    /// Get a node's payload.
    pub async fn get_data(&self, path: &NodePath) -> Result<Vec<u8>> {
        self.client.get_data(path).await
    }

    /// Replace a node's payload if its version still matches.
    ///
    /// # Errors
    /// - `VersionConflict` if `expected_version` is stale
    /// - `NoSuchPath` if the node does not exist
    pub async fn set_data(
        &self,
        path: &NodePath,
        expected_version: Option<i32>,
        data: Vec<u8>,
    ) -> Result<Stat> {
        let stat = self.client.set_data(path, expected_version, data).await?;
        debug!(path = %path, version = stat.version, "Data saved");
        Ok(stat)
    }

    /// Create `path` and any missing ancestors.
    ///
    /// Ancestors are always persistent; `mode` applies to `path` only.
    ///
    /// # Returns
    /// `true` if `path` was created, `false` if it already existed.
    ///
    /// # Errors
    /// - Any remote failure other than "already exists"
    pub async fn create(&self, path: &NodePath, mode: CreateMode) -> Result<bool> {
        if self.client.exists(path, false).await?.is_some() {
            return Ok(false);
        }

        match self.client.create(path, mode).await {
            Ok(()) => {
                info!(path = %path, ?mode, "Node created");
                return Ok(true);
            }
            Err(Error::AlreadyExists(_)) => return Ok(false),
            // An ancestor is missing.
            Err(Error::NoSuchPath(_)) => {}
            Err(e) => return Err(e),
        }

        for ancestor in path.ancestors() {
            match self.client.create(&ancestor, CreateMode::Persistent).await {
                Ok(()) => debug!("Created parent {}", ancestor),
                Err(Error::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        match self.client.create(path, mode).await {
            Ok(()) => {
                info!(path = %path, ?mode, "Node created");
                Ok(true)
            }
            Err(Error::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete `path` and all of its descendants.
    ///
    /// # Errors
    /// - `IllegalOperation` for the root
    /// - `NoSuchPath` if `path` does not exist
    pub async fn delete(&self, path: &NodePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::IllegalOperation(
                "Cannot delete the root node".to_string(),
            ));
        }
        self.delete_tree(path).await?;
        info!(path = %path, "Node deleted");
        Ok(())
    }

    /// Delete every descendant of `path`, keeping `path` itself.
    ///
    /// Children rejected with `BadArguments` are logged and skipped.
    pub async fn trim(&self, path: &NodePath) -> Result<()> {
        self.trim_children(path).await?;
        info!(path = %path, "Node trimmed");
        Ok(())
    }

    /// Delete `path` and collapse the chain of single-child ancestors above
    /// it.
    ///
    /// # Returns
    /// The nearest surviving ancestor (`/` when the chain reaches the root),
    /// or `None` if `path` did not exist.
    ///
    /// # Errors
    /// - `IllegalOperation` for the root
    pub async fn prune(&self, path: &NodePath) -> Result<Option<NodePath>> {
        if path.is_root() {
            return Err(Error::IllegalOperation(
                "Cannot prune the root node".to_string(),
            ));
        }
        if self.client.exists(path, false).await?.is_none() {
            return Ok(None);
        }

        // Find the oldest lonely ancestor.
        let mut target = path.clone();
        let survivor = loop {
            let Some(parent) = target.parent() else {
                break NodePath::root();
            };
            if parent.is_root() || self.client.get_children(&parent, false).await?.len() != 1 {
                break parent;
            }
            target = parent;
        };

        self.delete_tree(&target).await?;
        info!(path = %path, removed = %target, "Node pruned");
        Ok(Some(survivor))
    }

    /// Children first, then `path` itself if it is still there.
    fn delete_tree<'a>(&'a self, path: &'a NodePath) -> BoxFuture<'a, Result<()>> {
        async move {
            self.trim_children(path).await?;

            if self.client.exists(path, false).await?.is_some() {
                match self.client.delete(path).await {
                    Ok(()) => debug!("Deleted {}", path),
                    Err(Error::NoSuchPath(_)) => debug!("{} already deleted", path),
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn trim_children(&self, path: &NodePath) -> Result<()> {
        for name in self.client.get_children(path, false).await? {
            let result = match path.join(&name) {
                Ok(child) => self.delete_tree(&child).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {}
                Err(Error::BadArguments(msg)) => {
                    warn!("Skipping child {:?} of {}: {}", name, path, msg);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
