//! Engine session over a JSON-persisted namespace.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, info};

use nodesync_coord::{MemoryCoordinator, MemorySession};
use nodesync_sync::{ChannelListener, SyncConfig, SyncEngine, SyncEvent, SyncHandle};

/// Load the namespace stored at `path`; a missing file yields a new one.
pub async fn load_store(path: &Path) -> Result<MemoryCoordinator> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => MemoryCoordinator::from_json(&json)
            .with_context(|| format!("Invalid store {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Creating new store at {}", path.display());
            Ok(MemoryCoordinator::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read store {}", path.display())),
    }
}

/// Persist the namespace to `path`.
pub async fn save_store(coordinator: &MemoryCoordinator, path: &Path) -> Result<()> {
    let json = coordinator.to_json().context("Failed to encode store")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write store {}", path.display()))
}

/// A bootstrapped engine with its notification loop running.
pub struct Session {
    coordinator: MemoryCoordinator,
    store: PathBuf,
    engine: Arc<SyncEngine<MemorySession>>,
    events: UnboundedReceiver<SyncEvent>,
    handle: SyncHandle,
}

impl Session {
    /// Load the store, bootstrap an engine over it and start its loop.
    ///
    /// Bootstrap events are consumed; `settle` only reports what happens
    /// afterwards.
    pub async fn open(store: &Path) -> Result<Self> {
        let coordinator = load_store(store).await?;
        let (client, notifications) = coordinator.session();
        let engine = Arc::new(SyncEngine::new(client, SyncConfig::default()));

        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;
        engine.watch().await.context("Failed to bootstrap")?;

        let mut known = 0;
        while events.try_recv().is_ok() {
            known += 1;
        }
        debug!("Bootstrapped {} nodes from {}", known, store.display());

        let handle = engine.spawn(notifications);
        Ok(Self {
            coordinator,
            store: store.to_path_buf(),
            engine,
            events,
            handle,
        })
    }

    pub fn engine(&self) -> &SyncEngine<MemorySession> {
        &self.engine
    }

    /// Collect events until none arrives for `quiet`.
    pub async fn settle(&mut self, quiet: Duration) -> Vec<SyncEvent> {
        let mut seen = Vec::new();
        while let Ok(Some(event)) = timeout(quiet, self.events.recv()).await {
            seen.push(event);
        }
        seen
    }

    /// Stop the loop and write the namespace back to the store.
    pub async fn close(self) -> Result<()> {
        self.handle.shutdown().await;
        save_store(&self.coordinator, &self.store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_common::NodePath;
    use nodesync_coord::CreateMode;
    use nodesync_sync::EventKind;

    const QUIET: Duration = Duration::from_millis(100);

    fn path(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_missing_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = load_store(&dir.path().join("store.json")).await.unwrap();
        assert_eq!(coordinator.node_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");
        tokio::fs::write(&store, "not json").await.unwrap();
        assert!(load_store(&store).await.is_err());
    }

    #[tokio::test]
    async fn test_mutation_reported_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");

        let mut session = Session::open(&store).await.unwrap();
        session
            .engine()
            .create(&path("/app/config"), CreateMode::Persistent)
            .await
            .unwrap();
        let events = session.settle(QUIET).await;
        assert_eq!(
            events,
            vec![
                SyncEvent::add(path("/app")),
                SyncEvent::add(path("/app/config"))
            ]
        );
        session.close().await.unwrap();

        let mut session = Session::open(&store).await.unwrap();
        assert!(session.engine().contains(&path("/app/config")).await);
        assert!(session.settle(QUIET).await.is_empty());

        session.engine().delete(&path("/app")).await.unwrap();
        let kinds: Vec<EventKind> = session.settle(QUIET).await.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Delete, EventKind::Delete]);
        session.close().await.unwrap();

        assert_eq!(load_store(&store).await.unwrap().node_count(), 1);
    }

    #[tokio::test]
    async fn test_ephemeral_nodes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");

        let session = Session::open(&store).await.unwrap();
        session
            .engine()
            .create(&path("/locks/holder"), CreateMode::Ephemeral)
            .await
            .unwrap();
        session.close().await.unwrap();

        let coordinator = load_store(&store).await.unwrap();
        assert_eq!(coordinator.node_count(), 2);
    }
}
