//! Watch re-arming and notification classification.
//!
//! Every watch is one-shot: each notification consumes the watch that
//! produced it, so handling a notification always arms a fresh one before
//! anything else. Bootstrap and steady-state discovery share the same
//! worklist walk.

use tracing::{debug, error, warn};

use nodesync_common::{Error, NodePath, Result};
use nodesync_coord::{ChangeKind, CoordinationClient, Notification};

use crate::engine::SyncEngine;

/// Unit of discovery work.
#[derive(Debug)]
pub(crate) enum Step {
    /// Observe the node itself, then its children.
    Node(NodePath),
    /// List and observe the node's children.
    Children(NodePath),
}

impl<C: CoordinationClient + ?Sized + 'static> SyncEngine<C> {
    /// Classify a fired notification, re-arm watches and emit events.
    ///
    /// Never fails: remote errors are logged and the affected path is left
    /// for a later notification to correct.
    pub async fn handle_notification(&self, notification: Notification) {
        let _turn = self.turn.lock().await;
        debug!("Handling {}", notification);
        let Notification { kind, path } = notification;

        match kind {
            ChangeKind::NodeCreated => self.discover(Step::Node(path)).await,
            ChangeKind::NodeChildrenChanged => self.discover(Step::Children(path)).await,
            ChangeKind::NodeDataChanged => self.node_data_changed(path).await,
            ChangeKind::NodeDeleted => self.node_deleted(path).await,
        }
    }

    /// Walk the tree from `start` in pre-order, so that a parent's `Add`
    /// always precedes its children's.
    pub(crate) async fn discover(&self, start: Step) {
        let mut worklist = vec![start];

        while let Some(step) = worklist.pop() {
            match step {
                Step::Node(path) => {
                    if let Err(e) = self.observe_node(&path).await {
                        error!("Failed to watch {}: {}", path, e);
                    }
                    // Children may predate the creation notification.
                    worklist.push(Step::Children(path));
                }
                Step::Children(path) => {
                    let children = self.observe_children(&path).await;
                    worklist.extend(children.into_iter().rev().map(Step::Node));
                }
            }
        }
    }

    /// Arm an existence/data watch on `path` and emit `Add` if it is new.
    ///
    /// Returns whether the node exists.
    pub(crate) async fn observe_node(&self, path: &NodePath) -> Result<bool> {
        match self.client.exists(path, true).await {
            Ok(Some(_)) => {
                self.state.lock().await.record_added(path);
                Ok(true)
            }
            Ok(None) | Err(Error::NoSuchPath(_)) => {
                debug!("{} deleted before it could be watched", path);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Arm a children watch on `path` and return its children's paths.
    async fn observe_children(&self, path: &NodePath) -> Vec<NodePath> {
        let names = match self.client.get_children(path, true).await {
            Ok(names) => names,
            Err(Error::NoSuchPath(_)) => {
                debug!("{} deleted before its children could be listed", path);
                return Vec::new();
            }
            Err(Error::NotAuthorized(_)) => {
                warn!("Ignoring no auth listing children of {}", path);
                return Vec::new();
            }
            Err(e) => {
                error!("Failed to list children of {}: {}", path, e);
                return Vec::new();
            }
        };

        names
            .into_iter()
            .filter_map(|name| match path.join(&name) {
                Ok(child) => Some(child),
                Err(e) => {
                    warn!("Skipping child {:?} of {}: {}", name, path, e);
                    None
                }
            })
            .collect()
    }

    async fn node_data_changed(&self, path: NodePath) {
        match self.client.exists(&path, true).await {
            Ok(_) | Err(Error::NoSuchPath(_)) => {}
            Err(e) => error!("Failed to re-watch {}: {}", path, e),
        }
        // Emitted even if the node is already gone; a Delete follows.
        self.state.lock().await.record_updated(&path);
    }

    async fn node_deleted(&self, path: NodePath) {
        if !self.state.lock().await.record_deleted(&path) {
            debug!("Ignoring deletion of untracked {}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nodesync_coord::{CreateMode, MemoryCoordinator};

    use crate::engine::SyncConfig;
    use crate::event::SyncEvent;
    use crate::listener::ChannelListener;

    fn path(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<SyncEvent>) -> Vec<String> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.to_string());
        }
        events
    }

    #[tokio::test]
    async fn test_created_discovers_existing_children() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());
        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;

        engine.create(&path("/a/b/c"), CreateMode::Persistent).await.unwrap();
        engine.create(&path("/a/d"), CreateMode::Persistent).await.unwrap();

        engine
            .handle_notification(Notification::new(ChangeKind::NodeCreated, path("/a")))
            .await;

        let mut seen = drain(&mut events);
        assert_eq!(seen.remove(0), "add /a");
        // Siblings are unordered, but each child follows its parent.
        let pos = |s: &str| seen.iter().position(|e| e == s).unwrap();
        assert_eq!(seen.len(), 3);
        assert!(pos("add /a/b") < pos("add /a/b/c"));
        assert!(seen.contains(&"add /a/d".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_created_emits_once() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());
        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;
        engine.create(&path("/n"), CreateMode::Persistent).await.unwrap();

        for _ in 0..2 {
            engine
                .handle_notification(Notification::new(ChangeKind::NodeCreated, path("/n")))
                .await;
        }
        assert_eq!(drain(&mut events), vec!["add /n"]);
    }

    #[tokio::test]
    async fn test_created_for_vanished_node_is_swallowed() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());
        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;

        engine
            .handle_notification(Notification::new(ChangeKind::NodeCreated, path("/gone")))
            .await;
        engine
            .handle_notification(Notification::new(
                ChangeKind::NodeChildrenChanged,
                path("/gone"),
            ))
            .await;

        assert!(drain(&mut events).is_empty());
        assert!(!engine.contains(&path("/gone")).await);
    }

    #[tokio::test]
    async fn test_delete_of_untracked_path_is_silent() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());
        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;

        engine
            .handle_notification(Notification::new(ChangeKind::NodeDeleted, path("/ghost")))
            .await;
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_update_for_deleted_node_still_emitted() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());
        let (listener, mut events) = ChannelListener::new();
        engine.add_listener(listener).await;

        engine
            .handle_notification(Notification::new(
                ChangeKind::NodeDataChanged,
                path("/raced"),
            ))
            .await;
        assert_eq!(drain(&mut events), vec!["update /raced"]);
    }

    #[tokio::test]
    async fn test_unauthorized_subtree_left_unobserved() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = Arc::new(SyncEngine::new(session, SyncConfig::default()));
        engine.create(&path("/secret/inner"), CreateMode::Persistent).await.unwrap();
        engine.create(&path("/open"), CreateMode::Persistent).await.unwrap();
        coordinator.restrict(&path("/secret"));

        engine.watch().await.unwrap();

        assert!(engine.contains(&path("/secret")).await);
        assert!(!engine.contains(&path("/secret/inner")).await);
        assert!(engine.contains(&path("/open")).await);
    }

    #[tokio::test]
    async fn test_deep_tree_does_not_recurse() {
        let coordinator = MemoryCoordinator::new();
        let (session, _rx) = coordinator.session();
        let engine = SyncEngine::new(session, SyncConfig::default());

        let deep = (0..1000).fold(NodePath::root(), |p, i| p.join(&format!("d{}", i)).unwrap());
        engine.create(&deep, CreateMode::Persistent).await.unwrap();

        engine.watch().await.unwrap();
        assert_eq!(engine.snapshot().await.len(), 1001);
        assert!(engine.contains(&deep).await);
    }
}
